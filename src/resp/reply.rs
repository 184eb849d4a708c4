//! Reply variants and their wire serialization.
//!
//! Per spec: an empty bulk string serializes as the null bulk (`$-1\r\n`)
//! and an empty array serializes as the null array (`*-1\r\n`) — this
//! crate's committed encoding, not the usual Redis convention, but what
//! the core's external interface requires.

use bytes::{Bytes, BytesMut};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+...\r\n`
    Status(String),
    /// `-...\r\n`
    Error(String),
    /// `:...\r\n`
    Integer(i64),
    /// `$<n>\r\n...\r\n`, or the null bulk if empty.
    Bulk(Bytes),
    /// Explicit null bulk (`$-1\r\n`), distinct from an empty `Bulk`.
    NullBulk,
    /// `*<n>\r\n...`, or the null array if empty.
    Array(Vec<Reply>),
    /// Explicit null array (`*-1\r\n`).
    NullArray,
}

impl Reply {
    pub fn ok() -> Reply {
        Reply::Status("OK".to_string())
    }

    pub fn pong() -> Reply {
        Reply::Status("PONG".to_string())
    }

    pub fn bulk(b: impl Into<Bytes>) -> Reply {
        Reply::Bulk(b.into())
    }

    pub fn error(msg: impl Into<String>) -> Reply {
        Reply::Error(msg.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Serialize this reply to its RESP wire form.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.write_into(&mut buf);
        buf.freeze()
    }

    fn write_into(&self, buf: &mut BytesMut) {
        match self {
            Reply::Status(s) => {
                buf.extend_from_slice(b"+");
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Reply::Error(s) => {
                buf.extend_from_slice(b"-");
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Reply::Integer(n) => {
                buf.extend_from_slice(b":");
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Reply::Bulk(b) => {
                if b.is_empty() {
                    buf.extend_from_slice(b"$-1\r\n");
                } else {
                    buf.extend_from_slice(format!("${}\r\n", b.len()).as_bytes());
                    buf.extend_from_slice(b);
                    buf.extend_from_slice(b"\r\n");
                }
            }
            Reply::NullBulk => buf.extend_from_slice(b"$-1\r\n"),
            Reply::Array(items) => {
                if items.is_empty() {
                    buf.extend_from_slice(b"*-1\r\n");
                } else {
                    buf.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                    for item in items {
                        item.write_into(buf);
                    }
                }
            }
            Reply::NullArray => buf.extend_from_slice(b"*-1\r\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_error() {
        assert_eq!(&Reply::ok().to_bytes()[..], b"+OK\r\n");
        assert_eq!(&Reply::error("ERR boom").to_bytes()[..], b"-ERR boom\r\n");
    }

    #[test]
    fn integer() {
        assert_eq!(&Reply::Integer(42).to_bytes()[..], b":42\r\n");
    }

    #[test]
    fn bulk_and_null_bulk() {
        assert_eq!(&Reply::bulk(&b"hello"[..]).to_bytes()[..], b"$5\r\nhello\r\n");
        assert_eq!(&Reply::NullBulk.to_bytes()[..], b"$-1\r\n");
        assert_eq!(&Reply::bulk(&b""[..]).to_bytes()[..], b"$-1\r\n");
    }

    #[test]
    fn array_nonempty() {
        let r = Reply::Array(vec![Reply::bulk(&b"GET"[..]), Reply::bulk(&b"foo"[..])]);
        assert_eq!(&r.to_bytes()[..], b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n");
    }

    #[test]
    fn array_empty_is_null() {
        assert_eq!(&Reply::Array(vec![]).to_bytes()[..], b"*-1\r\n");
    }
}
