//! The error taxonomy surfaced to clients as RESP `-ERR`/`-WRONGTYPE` lines.
//!
//! Every command handler returns `Result<Reply, RedisError>`; the dispatcher
//! (`cmd::Engine::exec`) is the single place that turns an `Err` back into a
//! wire reply, so no handler needs to format an error line itself.

use crate::resp::reply::Reply;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum RedisError {
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR rename must within one node")]
    CrossNodeRename,

    #[error("ERR not supported command")]
    UnsupportedCommand,

    #[error("ERR {0}")]
    Relay(String),

    #[error("ERR unknown")]
    Panicked,

    #[error("ERR {0}")]
    Other(String),
}

impl RedisError {
    /// The single-line RESP error reply for this error, e.g. `-ERR ...\r\n`.
    pub fn into_reply(self) -> Reply {
        Reply::Error(self.to_string())
    }
}

impl From<RedisError> for Reply {
    fn from(e: RedisError) -> Reply {
        e.into_reply()
    }
}
