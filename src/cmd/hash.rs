//! `HSET`, `HGET`, `HDEL`.

use bytes::Bytes;

use crate::error::RedisError;
use crate::obj::{Hash, Value};
use crate::resp::Reply;
use crate::session::Session;

use super::{Command, Ctx};

pub fn commands() -> Vec<Command> {
    vec![
        Command { name: "hset", arity: 4, exec: hset },
        Command { name: "hget", arity: 3, exec: hget },
        Command { name: "hdel", arity: -3, exec: hdel },
    ]
}

fn hset(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let is_new = ks.mutate_or_insert(
        &args[1],
        || Value::Hash(Hash::new()),
        |v| -> Result<bool, RedisError> {
            let hash = v.as_hash_mut()?;
            Ok(hash.insert(args[2].clone(), args[3].clone()).is_none())
        },
    )?;
    Ok((Reply::Integer(is_new as i64), true))
}

fn hget(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let reply = match ks.get(&args[1]) {
        Some(v) => match v.as_hash()?.get(&args[2]) {
            Some(value) => Reply::bulk(value.clone()),
            None => Reply::NullBulk,
        },
        None => Reply::NullBulk,
    };
    Ok((reply, false))
}

fn hdel(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let removed = ks
        .mutate_if_exists(&args[1], |v| -> Result<i64, RedisError> {
            let hash = v.as_hash_mut()?;
            Ok(args[2..].iter().filter(|f| hash.shift_remove(f.as_ref()).is_some()).count() as i64)
        })
        .transpose()?
        .unwrap_or(0);
    Ok((Reply::Integer(removed), removed > 0))
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
    fn hset_reports_new_vs_update() {
        let e = engine();
        let mut s = Session::new();
        assert_eq!(e.exec(&mut s, &[b("hset"), b("h"), b("f"), b("v1")]), Reply::Integer(1));
        assert_eq!(e.exec(&mut s, &[b("hset"), b("h"), b("f"), b("v2")]), Reply::Integer(0));
        assert_eq!(e.exec(&mut s, &[b("hget"), b("h"), b("f")]), Reply::bulk(&b"v2"[..]));
    }

    #[test]
    fn hdel_removes_and_reports_count() {
        let e = engine();
        let mut s = Session::new();
        e.exec(&mut s, &[b("hset"), b("h"), b("f"), b("v")]);
        assert_eq!(e.exec(&mut s, &[b("hdel"), b("h"), b("f"), b("missing")]), Reply::Integer(1));
        assert_eq!(e.exec(&mut s, &[b("hget"), b("h"), b("f")]), Reply::NullBulk);
    }
}
