//! Database engine (C6): the process-wide command registry and the
//! dispatcher that resolves a parsed command line against it. Grounded on
//! the teacher's table-of-function-pointers dispatch shape (a `CMD_TABLE`
//! mapping name to `{exec, arity}`), split across per-category modules the
//! way `original_source/database/cmd/*.go` is split.

pub mod connection;
pub mod hash;
pub mod keys;
pub mod list;
pub mod set;
pub mod string;

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use once_cell::sync::Lazy;

use crate::aof::AofSink;
use crate::config::Config;
use crate::db::Db;
use crate::error::RedisError;
use crate::resp::Reply;
use crate::session::Session;

/// Shared, read-only context every command handler executes against.
pub struct Ctx<'a> {
    pub db: &'a Db,
    pub config: &'a Config,
    pub connected_clients: &'a AtomicU64,
    pub start_time: Instant,
}

/// A handler's second return value is whether it actually mutated the
/// keyspace — `SETNX`/`RENAMENX` may no-op on a conflict, so "is this
/// command category a write" alone isn't enough to decide AOF logging.
pub type CommandFn = fn(&Ctx, &mut Session, &[Bytes]) -> Result<(Reply, bool), RedisError>;

pub struct Command {
    pub name: &'static str,
    /// Non-negative: exact arg count including the command name itself.
    /// Negative: "at least |arity|".
    pub arity: i64,
    pub exec: CommandFn,
}

impl Command {
    fn arity_ok(&self, argc: usize) -> bool {
        if self.arity >= 0 {
            argc as i64 == self.arity
        } else {
            argc as i64 >= -self.arity
        }
    }
}

static REGISTRY: Lazy<HashMap<&'static str, Command>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for cmd in connection::commands()
        .into_iter()
        .chain(keys::commands())
        .chain(string::commands())
        .chain(list::commands())
        .chain(hash::commands())
        .chain(set::commands())
    {
        map.insert(cmd.name, cmd);
    }
    map
});

/// Look up a command by its already-lowercased name. Exposed so the
/// cluster router can check "is this a locally-known command" without
/// duplicating the registry.
pub fn lookup(name: &str) -> Option<&'static Command> {
    REGISTRY.get(name)
}

/// The standalone (non-cluster) database engine: owns the keyspaces, the
/// configuration, and an optional AOF sink.
pub struct Engine {
    db: Db,
    config: Config,
    aof: Option<AofSink>,
    connected_clients: AtomicU64,
    start_time: Instant,
}

impl Engine {
    pub fn new(config: Config, aof: Option<AofSink>) -> Self {
        let db = Db::new(config.databases);
        Engine { db, config, aof, connected_clients: AtomicU64::new(0), start_time: Instant::now() }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connected_clients(&self) -> &AtomicU64 {
        &self.connected_clients
    }

    pub fn on_connect(&self) {
        self.connected_clients.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_disconnect(&self) {
        self.connected_clients.fetch_sub(1, Ordering::Relaxed);
    }

    /// Wire up the AOF sink after boot-time replay has already populated
    /// the keyspace, so replayed commands are never re-logged.
    pub fn attach_aof(&mut self, sink: crate::aof::AofSink) {
        self.aof = Some(sink);
    }

    /// Clears every keyspace and drops the AOF sink, as graceful shutdown
    /// requires (spec.md §5, "Graceful shutdown").
    pub fn close(&self) {
        self.db.clear_all();
    }

    /// `Exec(session, args)` (spec.md §4.6): panic recovery, lowercase
    /// dispatch, `SELECT` short-circuit, lookup, arity check, invoke, and
    /// (on a successful mutating write) AOF append.
    pub fn exec(&self, session: &mut Session, args: &[Bytes]) -> Reply {
        let Some(first) = args.first() else {
            return RedisError::UnknownCommand(String::new()).into_reply();
        };
        let name = String::from_utf8_lossy(first).to_ascii_lowercase();

        if name == "select" {
            return self.exec_select(session, args);
        }

        let Some(cmd) = lookup(&name) else {
            return RedisError::UnknownCommand(name).into_reply();
        };
        if !cmd.arity_ok(args.len()) {
            return RedisError::WrongArity(name).into_reply();
        }

        let ctx = Ctx {
            db: &self.db,
            config: &self.config,
            connected_clients: &self.connected_clients,
            start_time: self.start_time,
        };

        let result = catch_unwind(AssertUnwindSafe(|| (cmd.exec)(&ctx, session, args)));
        let (reply, mutated) = match result {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => return e.into_reply(),
            Err(_) => return RedisError::Panicked.into_reply(),
        };

        if mutated {
            if let Some(aof) = &self.aof {
                aof.append(session.db_index(), args.to_vec());
            }
        }
        reply
    }

    fn exec_select(&self, session: &mut Session, args: &[Bytes]) -> Reply {
        if args.len() != 2 {
            return RedisError::WrongArity("select".to_string()).into_reply();
        }
        match crate::util::parse_int(&args[1]) {
            Ok(n) if n >= 0 && (n as usize) < self.db.len() => {
                session.select(n as usize);
                Reply::ok()
            }
            _ => RedisError::Other("DB index is out of range".to_string()).into_reply(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn engine() -> Engine {
        Engine::new(Config { databases: 4, ..Config::default() }, None)
    }

    #[test]
    fn unknown_command_is_reported() {
        let e = engine();
        let mut s = Session::new();
        let reply = e.exec(&mut s, &[Bytes::from_static(b"bogus")]);
        assert!(matches!(reply, Reply::Error(ref m) if m.starts_with("ERR unknown command")));
    }

    #[test]
    fn select_validates_range_and_switches_db() {
        let e = engine();
        let mut s = Session::new();
        let reply = e.exec(&mut s, &[Bytes::from_static(b"select"), Bytes::from_static(b"2")]);
        assert_eq!(reply, Reply::ok());
        assert_eq!(s.db_index(), 2);

        let reply = e.exec(&mut s, &[Bytes::from_static(b"select"), Bytes::from_static(b"99")]);
        assert!(reply.is_error());
    }

    #[test]
    fn wrong_arity_is_reported() {
        let e = engine();
        let mut s = Session::new();
        let reply = e.exec(&mut s, &[Bytes::from_static(b"get")]);
        assert!(matches!(reply, Reply::Error(ref m) if m.contains("wrong number of arguments")));
    }
}
