//! `GET`, `SET`, `SETNX`, `GETSET`, `STRLEN`.

use bytes::Bytes;

use crate::error::RedisError;
use crate::obj::Value;
use crate::resp::Reply;
use crate::session::Session;

use super::{Command, Ctx};

pub fn commands() -> Vec<Command> {
    vec![
        Command { name: "get", arity: 2, exec: get },
        Command { name: "set", arity: 3, exec: set },
        Command { name: "setnx", arity: 3, exec: setnx },
        Command { name: "getset", arity: 3, exec: getset },
        Command { name: "strlen", arity: 2, exec: strlen },
    ]
}

fn get(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    match ks.get(&args[1]) {
        Some(v) => Ok((Reply::bulk(v.as_str()?.clone()), false)),
        None => Ok((Reply::NullBulk, false)),
    }
}

fn set(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    ks.put(args[1].clone(), Value::Str(args[2].clone()));
    Ok((Reply::ok(), true))
}

fn setnx(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let inserted = ks.put_if_absent(args[1].clone(), Value::Str(args[2].clone()));
    Ok((Reply::Integer(inserted), inserted == 1))
}

fn getset(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let previous = match ks.get(&args[1]) {
        Some(v) => Some(v.as_str()?.clone()),
        None => None,
    };
    ks.put(args[1].clone(), Value::Str(args[2].clone()));
    let reply = match previous {
        Some(b) => Reply::bulk(b),
        None => Reply::NullBulk,
    };
    Ok((reply, true))
}

fn strlen(ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let ks = ctx.db.keyspace(session.db_index());
    let len = match ks.get(&args[1]) {
        Some(v) => v.as_str()?.len() as i64,
        None => 0,
    };
    Ok((Reply::Integer(len), false))
}
