//! `LPUSH`, `RPUSH`, `LPOP`, `RPOP`, `LLEN`, `LRANGE`.

use bytes::Bytes;

use crate::error::RedisError;
use crate::obj::Value;
use crate::resp::Reply;
use crate::session::Session;
use crate::util::parse_int;

use super::{Command, Ctx};

pub fn commands() -> Vec<Command> {
    vec![
        Command { name: "lpush", arity: -3, exec: lpush },
        Command { name: "rpush", arity: -3, exec: rpush },
        Command { name: "lpop", arity: 2, exec: lpop },
        Command { name: "rpop", arity: 2, exec: rpop },
        Command { name: "llen", arity: 2, exec: llen },
        Command { name: "lrange", arity: 4, exec: lrange },
    ]
}

fn lpush(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let len = ks.mutate_or_insert(
        &args[1],
        Value::new_list,
        |v| -> Result<usize, RedisError> {
            let list = v.as_list_mut()?;
            for value in &args[2..] {
                list.push_front(value.clone());
            }
            Ok(list.len())
        },
    )?;
    Ok((Reply::Integer(len as i64), true))
}

fn rpush(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let len = ks.mutate_or_insert(
        &args[1],
        Value::new_list,
        |v| -> Result<usize, RedisError> {
            let list = v.as_list_mut()?;
            for value in &args[2..] {
                list.push_back(value.clone());
            }
            Ok(list.len())
        },
    )?;
    Ok((Reply::Integer(len as i64), true))
}

fn lpop(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let popped = ks
        .mutate_if_exists(&args[1], |v| -> Result<Option<Bytes>, RedisError> { Ok(v.as_list_mut()?.pop_front()) })
        .transpose()?
        .flatten();
    let mutated = popped.is_some();
    let reply = popped.map(Reply::bulk).unwrap_or(Reply::NullBulk);
    Ok((reply, mutated))
}

fn rpop(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let popped = ks
        .mutate_if_exists(&args[1], |v| -> Result<Option<Bytes>, RedisError> { Ok(v.as_list_mut()?.pop_back()) })
        .transpose()?
        .flatten();
    let mutated = popped.is_some();
    let reply = popped.map(Reply::bulk).unwrap_or(Reply::NullBulk);
    Ok((reply, mutated))
}

fn llen(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let len = match ks.get(&args[1]) {
        Some(v) => v.as_list()?.len() as i64,
        None => 0,
    };
    Ok((Reply::Integer(len), false))
}

fn lrange(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let start = parse_int(&args[2])?;
    let stop = parse_int(&args[3])?;
    let ks = ctx.db.keyspace(session.db_index());
    let items = match ks.get(&args[1]) {
        Some(v) => v.as_list()?.range(start, stop),
        None => Vec::new(),
    };
    Ok((Reply::Array(items.into_iter().map(Reply::bulk).collect()), false))
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
    fn lpush_then_lrange_matches_reverse_push_order() {
        let e = engine();
        let mut s = Session::new();
        e.exec(&mut s, &[b("lpush"), b("k"), b("a"), b("b"), b("c")]);
        let reply = e.exec(&mut s, &[b("lrange"), b("k"), b("0"), b("-1")]);
        match reply {
            Reply::Array(items) => {
                let vals: Vec<Bytes> = items
                    .into_iter()
                    .map(|r| match r {
                        Reply::Bulk(b) => b,
                        _ => panic!("expected bulk"),
                    })
                    .collect();
                assert_eq!(vals, vec![b("c"), b("b"), b("a")]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rpush_then_lrange_preserves_push_order() {
        let e = engine();
        let mut s = Session::new();
        e.exec(&mut s, &[b("rpush"), b("k"), b("a"), b("b"), b("c")]);
        let reply = e.exec(&mut s, &[b("lrange"), b("k"), b("0"), b("-1")]);
        match reply {
            Reply::Array(items) => assert_eq!(items.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lpop_and_rpop_on_missing_key_are_null() {
        let e = engine();
        let mut s = Session::new();
        assert_eq!(e.exec(&mut s, &[b("lpop"), b("nope")]), Reply::NullBulk);
        assert_eq!(e.exec(&mut s, &[b("rpop"), b("nope")]), Reply::NullBulk);
    }

    #[test]
    fn llen_reports_zero_for_missing_key() {
        let e = engine();
        let mut s = Session::new();
        assert_eq!(e.exec(&mut s, &[b("llen"), b("nope")]), Reply::Integer(0));
    }
}
