//! `DEL`, `EXISTS`, `FLUSHDB`, `TYPE`, `RENAME`, `RENAMENX`, `KEYS`.

use bytes::Bytes;

use crate::error::RedisError;
use crate::resp::Reply;
use crate::session::Session;
use crate::wildcard;

use super::{Command, Ctx};

pub fn commands() -> Vec<Command> {
    vec![
        Command { name: "del", arity: -2, exec: del },
        Command { name: "exists", arity: -2, exec: exists },
        Command { name: "flushdb", arity: 1, exec: flushdb },
        Command { name: "type", arity: 2, exec: type_cmd },
        Command { name: "rename", arity: 3, exec: rename },
        Command { name: "renamenx", arity: 3, exec: renamenx },
        Command { name: "keys", arity: 2, exec: keys },
    ]
}

fn del(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let removed: i64 = args[1..].iter().map(|k| ks.remove(k)).sum();
    Ok((Reply::Integer(removed), removed > 0))
}

fn exists(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let present: i64 = args[1..].iter().map(|k| i64::from(ks.contains(k))).sum();
    Ok((Reply::Integer(present), false))
}

fn flushdb(ctx: &Ctx, session: &mut Session, _args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    ctx.db.keyspace(session.db_index()).clear();
    Ok((Reply::ok(), true))
}

fn type_cmd(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let name = ks.get(&args[1]).map(|v| v.type_name()).unwrap_or("none");
    Ok((Reply::Status(name.to_string()), false))
}

fn rename(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    match ks.rename(&args[1], args[2].clone()) {
        Some(()) => Ok((Reply::ok(), true)),
        None => Err(RedisError::Other("no such key".to_string())),
    }
}

fn renamenx(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    if !ks.contains(&args[1]) {
        return Err(RedisError::Other("no such key".to_string()));
    }
    if ks.contains(&args[2]) {
        return Ok((Reply::Integer(0), false));
    }
    ks.rename(&args[1], args[2].clone());
    Ok((Reply::Integer(1), true))
}

fn keys(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let pattern = String::from_utf8_lossy(&args[1]).into_owned();
    let compiled = wildcard::Pattern::compile(&pattern);
    let mut matches = Vec::new();
    ks.for_each(|k, _| {
        if compiled.is_match(k) {
            matches.push(Reply::bulk(k.clone()));
        }
        true
    });
    Ok((Reply::Array(matches), false))
}
