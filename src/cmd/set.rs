//! `SADD`, `SREM`, `SISMEMBER`.

use bytes::Bytes;
use std::collections::HashSet;

use crate::error::RedisError;
use crate::obj::Value;
use crate::resp::Reply;
use crate::session::Session;

use super::{Command, Ctx};

pub fn commands() -> Vec<Command> {
    vec![
        Command { name: "sadd", arity: -3, exec: sadd },
        Command { name: "srem", arity: -3, exec: srem },
        Command { name: "sismember", arity: 3, exec: sismember },
    ]
}

fn sadd(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let added = ks.mutate_or_insert(
        &args[1],
        || Value::Set(HashSet::new()),
        |v| -> Result<i64, RedisError> {
            let set = v.as_set_mut()?;
            Ok(args[2..].iter().filter(|m| set.insert((*m).clone())).count() as i64)
        },
    )?;
    Ok((Reply::Integer(added), added > 0))
}

fn srem(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let removed = ks
        .mutate_if_exists(&args[1], |v| -> Result<i64, RedisError> {
            let set = v.as_set_mut()?;
            Ok(args[2..].iter().filter(|m| set.remove(m.as_ref())).count() as i64)
        })
        .transpose()?
        .unwrap_or(0);
    Ok((Reply::Integer(removed), removed > 0))
}

fn sismember(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let is_member = match ks.get(&args[1]) {
        Some(v) => v.as_set()?.contains(args[2].as_ref()),
        None => false,
    };
    Ok((Reply::Integer(is_member as i64), false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::Engine;
    use crate::config::Config;

    fn engine() -> Engine {
        Engine::new(Config { databases: 1, ..Config::default() }, None)
    }

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn sadd_deduplicates_repeated_members() {
        let e = engine();
        let mut s = Session::new();
        let reply = e.exec(&mut s, &[b("sadd"), b("k"), b("x"), b("x"), b("x")]);
        assert_eq!(reply, Reply::Integer(1));
        assert_eq!(e.exec(&mut s, &[b("sismember"), b("k"), b("x")]), Reply::Integer(1));
    }

    #[test]
    fn srem_reports_removed_count() {
        let e = engine();
        let mut s = Session::new();
        e.exec(&mut s, &[b("sadd"), b("k"), b("x"), b("y")]);
        assert_eq!(e.exec(&mut s, &[b("srem"), b("k"), b("x"), b("missing")]), Reply::Integer(1));
        assert_eq!(e.exec(&mut s, &[b("sismember"), b("k"), b("x")]), Reply::Integer(0));
    }

    #[test]
    fn sismember_on_missing_key_is_zero() {
        let e = engine();
        let mut s = Session::new();
        assert_eq!(e.exec(&mut s, &[b("sismember"), b("nope"), b("x")]), Reply::Integer(0));
    }
}
