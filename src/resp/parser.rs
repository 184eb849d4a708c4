//! The RESP state machine: turns a byte stream into a lazy sequence of
//! payloads. Restartable per connection — all mutable state lives in the
//! `Parser` the caller owns, not in any global.
//!
//! Five inline types are accepted: `+` status, `-` error, `:` integer,
//! `$<n>` bulk string, `*<n>` array. Everything else is a protocol error.

use bytes::{Bytes, BytesMut};
use std::fmt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::reply::Reply;

#[derive(Debug, Clone)]
pub struct ProtocolError(pub String);

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol error: {}", self.0)
    }
}

/// One item out of the parser: either a parsed reply/request, or an error.
#[derive(Debug)]
pub struct Payload {
    pub data: Option<Reply>,
    pub err: Option<ProtocolError>,
}

/// Internal read state, reset after every fully-emitted payload.
///
/// `bulk_len`: when zero, the next line is read header-style (split on
/// `\n`); when non-zero, the next line is read body-style (exactly
/// `bulk_len + 2` raw bytes, CRLF included), mirroring the dual-mode
/// `readLine` this was ported from.
#[derive(Default)]
struct ReadState {
    reading_multi_line: bool,
    expected_args_count: i64,
    msg_type: u8,
    args: Vec<Bytes>,
    bulk_len: i64,
}

impl ReadState {
    fn finished(&self) -> bool {
        self.expected_args_count > 0 && self.args.len() as i64 == self.expected_args_count
    }
}

enum LineOutcome {
    /// A newline-delimited header line, e.g. `$5` or `*2`.
    Header(Bytes),
    /// Exactly `bulk_len` raw payload bytes (CRLF already stripped) — never
    /// re-interpreted even if it happens to start with `$`.
    Body(Bytes),
    /// Non-I/O framing error: reply with an error, keep the connection.
    Protocol(String),
    /// I/O error (including EOF): reply with an error, terminate the sequence.
    Io(String),
}

/// A restartable RESP parser over an async byte source. The caller supplies
/// a buffered reader (e.g. the read half of a `TcpStream` wrapped in a
/// `BufReader`) and pulls payloads one at a time with [`Parser::next_payload`].
pub struct Parser<R> {
    reader: R,
    state: ReadState,
    /// Set once an I/O error (including EOF) has terminated the sequence.
    done: bool,
}

impl<R: AsyncBufRead + Unpin> Parser<R> {
    pub fn new(reader: R) -> Self {
        Parser { reader, state: ReadState::default(), done: false }
    }

    /// Pull the next payload. Returns `None` once the sequence has
    /// terminated (a prior I/O error/EOF already surfaced as a payload).
    pub async fn next_payload(&mut self) -> Option<Payload> {
        if self.done {
            return None;
        }
        loop {
            let outcome = self.read_line().await;
            let line = match outcome {
                LineOutcome::Protocol(msg) => {
                    self.state = ReadState::default();
                    return Some(Payload { data: None, err: Some(ProtocolError(msg)) });
                }
                LineOutcome::Io(msg) => {
                    self.done = true;
                    return Some(Payload { data: None, err: Some(ProtocolError(msg)) });
                }
                LineOutcome::Body(body) => {
                    // Raw payload bytes for the in-flight arg: never
                    // re-examined for a leading '$', append as-is.
                    self.state.args.push(body);
                    if self.state.finished() {
                        return Some(self.emit_finished());
                    }
                    continue;
                }
                LineOutcome::Header(l) => l,
            };
            let line = line;

            if !self.state.reading_multi_line {
                match line.first().copied() {
                    Some(b'*') => match parse_multi_bulk_header(&line) {
                        Ok(0) => {
                            self.state = ReadState::default();
                            return Some(Payload { data: Some(Reply::Array(vec![])), err: None });
                        }
                        Ok(n) => {
                            self.state.reading_multi_line = true;
                            self.state.msg_type = b'*';
                            self.state.expected_args_count = n;
                            self.state.args = Vec::with_capacity(n as usize);
                        }
                        Err(e) => {
                            self.state = ReadState::default();
                            return Some(Payload { data: None, err: Some(e) });
                        }
                    },
                    Some(b'$') => match parse_bulk_header(&line) {
                        Ok(n) if n == -1 => {
                            self.state = ReadState::default();
                            return Some(Payload { data: Some(Reply::NullBulk), err: None });
                        }
                        Ok(n) => {
                            self.state.reading_multi_line = true;
                            self.state.msg_type = b'$';
                            self.state.expected_args_count = 1;
                            self.state.bulk_len = n;
                            self.state.args = Vec::with_capacity(1);
                        }
                        Err(e) => {
                            self.state = ReadState::default();
                            return Some(Payload { data: None, err: Some(e) });
                        }
                    },
                    Some(b'+') | Some(b'-') | Some(b':') => {
                        let result = parse_single_line_reply(&line);
                        self.state = ReadState::default();
                        return match result {
                            Ok(r) => Some(Payload { data: Some(r), err: None }),
                            Err(e) => Some(Payload { data: None, err: Some(e) }),
                        };
                    }
                    _ => {
                        self.state = ReadState::default();
                        return Some(Payload {
                            data: None,
                            err: Some(ProtocolError(format!("unknown type byte in {:?}", line))),
                        });
                    }
                }
            } else {
                // In multi-line mode, a Header line names the next
                // element's length; a non-positive length has no body to
                // read, so the (empty) arg is complete immediately.
                let len: i64 = match std::str::from_utf8(&line[1..]).ok().and_then(|s| s.parse().ok()) {
                    Some(n) if line.first() == Some(&b'$') => n,
                    _ => {
                        self.state = ReadState::default();
                        return Some(Payload {
                            data: None,
                            err: Some(ProtocolError(format!("expected bulk header, got {:?}", line))),
                        });
                    }
                };
                if len <= 0 {
                    // A non-positive length still names a header with
                    // exactly `n+2` bytes of body on the wire — here just
                    // the trailing CRLF, no payload — and it must be
                    // consumed now. Leaving it unread would hand the next
                    // `read_line` call a stray CRLF to misparse as its own
                    // header.
                    let mut crlf = [0u8; 2];
                    match self.reader.read_exact(&mut crlf).await {
                        Ok(_) if &crlf == b"\r\n" => {}
                        Ok(_) => {
                            self.state = ReadState::default();
                            return Some(Payload {
                                data: None,
                                err: Some(ProtocolError("missing CRLF after empty bulk".to_string())),
                            });
                        }
                        Err(e) => {
                            self.done = true;
                            return Some(Payload { data: None, err: Some(ProtocolError(e.to_string())) });
                        }
                    }
                    self.state.args.push(Bytes::new());
                    if self.state.finished() {
                        return Some(self.emit_finished());
                    }
                } else {
                    self.state.bulk_len = len;
                }
            }
        }
    }

    /// Build the terminal payload once `expected_args_count` args have
    /// been collected, and reset state for the next payload.
    fn emit_finished(&mut self) -> Payload {
        let msg_type = self.state.msg_type;
        let args = std::mem::take(&mut self.state.args);
        self.state = ReadState::default();
        let data = if msg_type == b'*' {
            Reply::Array(args.into_iter().map(Reply::Bulk).collect())
        } else {
            Reply::Bulk(args.into_iter().next().unwrap_or_default())
        };
        Payload { data: Some(data), err: None }
    }

    /// Read one "line": header-style (split on `\n`) when `bulk_len == 0`,
    /// or exactly `bulk_len + 2` raw bytes otherwise. Either way the
    /// trailing CRLF is verified and stripped before returning.
    async fn read_line(&mut self) -> LineOutcome {
        if self.state.bulk_len == 0 {
            let mut buf = Vec::new();
            match self.reader.read_until(b'\n', &mut buf).await {
                Ok(0) => LineOutcome::Io("EOF".to_string()),
                Ok(_) => {
                    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
                        LineOutcome::Protocol(format!("{:?}", String::from_utf8_lossy(&buf)))
                    } else {
                        buf.truncate(buf.len() - 2);
                        LineOutcome::Header(Bytes::from(buf))
                    }
                }
                Err(e) => LineOutcome::Io(e.to_string()),
            }
        } else {
            let n = self.state.bulk_len as usize;
            self.state.bulk_len = 0;
            let mut buf = BytesMut::zeroed(n + 2);
            match self.reader.read_exact(&mut buf).await {
                Ok(_) => {
                    if buf[n] != b'\r' || buf[n + 1] != b'\n' {
                        LineOutcome::Protocol("missing CRLF after bulk payload".to_string())
                    } else {
                        buf.truncate(n);
                        LineOutcome::Body(buf.freeze())
                    }
                }
                Err(e) => LineOutcome::Io(e.to_string()),
            }
        }
    }
}

fn parse_multi_bulk_header(line: &[u8]) -> Result<i64, ProtocolError> {
    if line.len() < 2 {
        return Err(ProtocolError(format!("bad multibulk header {:?}", line)));
    }
    std::str::from_utf8(&line[1..])
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|n| *n >= 0)
        .ok_or_else(|| ProtocolError(format!("bad multibulk length in {:?}", line)))
}

fn parse_bulk_header(line: &[u8]) -> Result<i64, ProtocolError> {
    if line.len() < 2 {
        return Err(ProtocolError(format!("bad bulk header {:?}", line)));
    }
    std::str::from_utf8(&line[1..])
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|n| *n >= -1)
        .ok_or_else(|| ProtocolError(format!("bad bulk length in {:?}", line)))
}

fn parse_single_line_reply(line: &[u8]) -> Result<Reply, ProtocolError> {
    if line.is_empty() {
        return Err(ProtocolError("empty line".to_string()));
    }
    let body = std::str::from_utf8(&line[1..]).map_err(|_| ProtocolError("non-utf8 line".to_string()))?;
    match line[0] {
        b'+' => Ok(Reply::Status(body.to_string())),
        b'-' => Ok(Reply::Error(body.to_string())),
        b':' => body
            .parse::<i64>()
            .map(Reply::Integer)
            .map_err(|_| ProtocolError(format!("bad integer '{body}'"))),
        other => Err(ProtocolError(format!("unknown type byte '{}'", other as char))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn parse_all(input: &'static [u8]) -> Vec<Payload> {
        let mut parser = Parser::new(BufReader::new(input));
        let mut out = Vec::new();
        while let Some(p) = parser.next_payload().await {
            out.push(p);
        }
        out
    }

    #[tokio::test]
    async fn parses_command_array() {
        let payloads = parse_all(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").await;
        assert_eq!(payloads.len(), 2); // one array payload, one terminal EOF payload
        match &payloads[0].data {
            Some(Reply::Array(items)) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0], Reply::Bulk(Bytes::from_static(b"GET")));
                assert_eq!(items[1], Reply::Bulk(Bytes::from_static(b"foo")));
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert!(payloads[1].err.is_some());
    }

    #[tokio::test]
    async fn standalone_bulk_command() {
        let payloads = parse_all(b"$4\r\nPING\r\n").await;
        assert_eq!(payloads[0].data, Some(Reply::Bulk(Bytes::from_static(b"PING"))));
    }

    #[tokio::test]
    async fn empty_array() {
        let payloads = parse_all(b"*0\r\n").await;
        assert_eq!(payloads[0].data, Some(Reply::Array(vec![])));
    }

    #[tokio::test]
    async fn null_bulk() {
        let payloads = parse_all(b"$-1\r\n").await;
        assert_eq!(payloads[0].data, Some(Reply::NullBulk));
    }

    #[tokio::test]
    async fn single_line_replies() {
        let payloads = parse_all(b"+OK\r\n-ERR oops\r\n:42\r\n").await;
        assert_eq!(payloads[0].data, Some(Reply::Status("OK".to_string())));
        assert_eq!(payloads[1].data, Some(Reply::Error("ERR oops".to_string())));
        assert_eq!(payloads[2].data, Some(Reply::Integer(42)));
    }

    #[tokio::test]
    async fn malformed_header_keeps_parsing() {
        let payloads = parse_all(b"*x\r\n+OK\r\n").await;
        assert!(payloads[0].err.is_some());
        assert_eq!(payloads[1].data, Some(Reply::Status("OK".to_string())));
    }

    #[tokio::test]
    async fn array_of_empty_bulk_elements() {
        let payloads = parse_all(b"*1\r\n$0\r\n\r\n").await;
        match &payloads[0].data {
            Some(Reply::Array(items)) => assert_eq!(items[0], Reply::Bulk(Bytes::new())),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_bulk_mid_array_does_not_desync_the_next_element() {
        let payloads = parse_all(b"*2\r\n$0\r\n\r\n$1\r\nx\r\n").await;
        match &payloads[0].data {
            Some(Reply::Array(items)) => {
                assert_eq!(items[0], Reply::Bulk(Bytes::new()));
                assert_eq!(items[1], Reply::Bulk(Bytes::from_static(b"x")));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn trailing_empty_bulk_does_not_corrupt_the_next_payload() {
        let payloads = parse_all(b"*1\r\n$0\r\n\r\n+OK\r\n").await;
        match &payloads[0].data {
            Some(Reply::Array(items)) => assert_eq!(items[0], Reply::Bulk(Bytes::new())),
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(payloads[1].data, Some(Reply::Status("OK".to_string())));
    }
}
