//! `PING`, `ECHO`, `CLIENT SETNAME`/`CLIENT GETNAME`, `CONFIG GET`, `INFO`.
//! `SELECT` is dispatched directly by `Engine::exec` (spec.md §4.6 step 3)
//! and is not registered here.

use std::fmt::Write as _;
use std::sync::atomic::Ordering;

use bytes::Bytes;

use crate::config::AppendFsync;
use crate::error::RedisError;
use crate::resp::Reply;
use crate::session::Session;

use super::{Command, Ctx};

pub fn commands() -> Vec<Command> {
    vec![
        Command { name: "ping", arity: -1, exec: ping },
        Command { name: "echo", arity: 2, exec: echo },
        Command { name: "client", arity: -2, exec: client },
        Command { name: "config", arity: -2, exec: config },
        Command { name: "info", arity: 1, exec: info },
    ]
}

fn ping(_ctx: &Ctx, _session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let reply = match args.get(1) {
        Some(msg) => Reply::bulk(msg.clone()),
        None => Reply::pong(),
    };
    Ok((reply, false))
}

fn echo(_ctx: &Ctx, _session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    Ok((Reply::bulk(args[1].clone()), false))
}

fn client(_ctx: &Ctx, session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let sub = String::from_utf8_lossy(&args[1]).to_ascii_lowercase();
    match sub.as_str() {
        "setname" if args.len() == 3 => {
            session.set_client_name(String::from_utf8_lossy(&args[2]).into_owned());
            Ok((Reply::ok(), false))
        }
        "getname" if args.len() == 2 => {
            let name = session.client_name();
            let reply = if name.is_empty() { Reply::NullBulk } else { Reply::bulk(Bytes::copy_from_slice(name.as_bytes())) };
            Ok((reply, false))
        }
        _ => Err(RedisError::Other(format!("unknown CLIENT subcommand or wrong number of arguments for '{sub}'"))),
    }
}

fn config(ctx: &Ctx, _session: &mut Session, args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let sub = String::from_utf8_lossy(&args[1]).to_ascii_lowercase();
    if sub != "get" || args.len() != 3 {
        return Err(RedisError::Other("CONFIG only supports GET <parameter>".to_string()));
    }
    let key = String::from_utf8_lossy(&args[2]).to_ascii_lowercase();
    let value = config_value(ctx, &key);
    let reply = match value {
        Some(v) => Reply::Array(vec![Reply::bulk(Bytes::copy_from_slice(key.as_bytes())), Reply::bulk(Bytes::from(v))]),
        None => Reply::Array(vec![]),
    };
    Ok((reply, false))
}

fn config_value(ctx: &Ctx, key: &str) -> Option<String> {
    let cfg = ctx.config;
    Some(match key {
        "bind" => cfg.bind.clone(),
        "port" => cfg.port.to_string(),
        "databases" => cfg.databases.to_string(),
        "appendonly" => if cfg.appendonly { "yes" } else { "no" }.to_string(),
        "appendfilename" => cfg.appendfilename.clone(),
        "appendfsync" => match cfg.appendfsync {
            AppendFsync::Always => "always".to_string(),
            AppendFsync::EverySec => "everysec".to_string(),
            AppendFsync::No => "no".to_string(),
        },
        "maxclients" => cfg.maxclients.to_string(),
        "requirepass" => cfg.requirepass.clone().unwrap_or_default(),
        "self" => cfg.cluster_self.clone().unwrap_or_default(),
        "peers" => cfg.cluster_peers.join(","),
        "cluster-replicas" => cfg.cluster_replicas.to_string(),
        "dir" => cfg.dir.clone(),
        _ => return None,
    })
}

fn info(ctx: &Ctx, _session: &mut Session, _args: &[Bytes]) -> Result<(Reply, bool), RedisError> {
    let mut out = String::new();
    let _ = writeln!(out, "# Server");
    let _ = writeln!(out, "ferrite_version:{}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "tcp_port:{}", ctx.config.port);
    let _ = writeln!(out, "uptime_in_seconds:{}", ctx.start_time.elapsed().as_secs());
    let _ = writeln!(out);
    let _ = writeln!(out, "# Clients");
    let _ = writeln!(out, "connected_clients:{}", ctx.connected_clients.load(Ordering::Relaxed));
    let _ = writeln!(out);
    let _ = writeln!(out, "# Keyspace");
    for i in 0..ctx.db.len() {
        let ks = ctx.db.keyspace(i);
        if !ks.is_empty() {
            let _ = writeln!(out, "db{}:keys={}", i, ks.len());
        }
    }
    Ok((Reply::bulk(Bytes::from(out)), false))
}
