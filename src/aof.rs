//! Append-only file (C7): a bounded channel feeding a single consumer task
//! that owns the file handle, so `Engine::exec` never blocks on disk I/O on
//! the command-processing path. Grounded on `original_source/aof/aof.go`'s
//! `AofHandler`/`handleAof` shape (a buffered channel drained by one
//! goroutine that injects a `SELECT` on DB-index change and honors the
//! configured fsync policy), translated to a Tokio task over an
//! `mpsc::Receiver`.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::config::AppendFsync;
use crate::resp::{Parser, Reply};
use crate::session::Session;

/// Sized generously above any plausible burst; a full channel means the
/// writer task has stalled, not ordinary backpressure callers should pay
/// a synchronous cost for.
const CHANNEL_CAPACITY: usize = 65_536;

const EVERYSEC_INTERVAL: Duration = Duration::from_secs(1);

struct Entry {
    db_index: usize,
    cmdline: Vec<Bytes>,
}

/// Handle command handlers use to log a mutating write. Cheap to clone
/// (just a channel sender); the actual file lives in the background task.
#[derive(Clone)]
pub struct AofSink {
    tx: mpsc::Sender<Entry>,
}

impl AofSink {
    /// Open (creating if needed) `<dir>/<filename>` for appending and spawn
    /// the writer task.
    pub async fn open(dir: &str, filename: &str, fsync: AppendFsync) -> io::Result<AofSink> {
        let path = Path::new(dir).join(filename);
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(run_writer(file, rx, fsync));
        Ok(AofSink { tx })
    }

    /// Log a mutating write. Non-blocking: called from the synchronous
    /// command-dispatch path, so a full channel is reported and dropped
    /// rather than awaited.
    pub fn append(&self, db_index: usize, cmdline: Vec<Bytes>) {
        if self.tx.try_send(Entry { db_index, cmdline }).is_err() {
            crate::log::error!("append-only channel full or closed, dropping write");
        }
    }
}

async fn run_writer(mut file: File, mut rx: mpsc::Receiver<Entry>, fsync: AppendFsync) {
    let mut last_db: Option<usize> = None;
    let mut ticker = tokio::time::interval(EVERYSEC_INTERVAL);
    ticker.tick().await; // first tick fires immediately; consume it

    loop {
        tokio::select! {
            biased;

            entry = rx.recv() => {
                let Some(entry) = entry else { break };
                let mut buf = BytesMut::new();
                if last_db != Some(entry.db_index) {
                    encode_cmdline(&mut buf, &[Bytes::from_static(b"SELECT"), Bytes::from(entry.db_index.to_string())]);
                    last_db = Some(entry.db_index);
                }
                encode_cmdline(&mut buf, &entry.cmdline);
                if let Err(e) = file.write_all(&buf).await {
                    crate::log::error!("append-only file write failed: {e}");
                    continue;
                }
                if fsync == AppendFsync::Always {
                    if let Err(e) = file.sync_all().await {
                        crate::log::error!("append-only file sync failed: {e}");
                    }
                }
            }

            _ = ticker.tick(), if fsync == AppendFsync::EverySec => {
                if let Err(e) = file.sync_all().await {
                    crate::log::error!("append-only file sync failed: {e}");
                }
            }
        }
    }
}

/// Serialize `args` as a RESP command array (`*n\r\n$len\r\n...\r\n...`),
/// the real Redis wire format — distinct from `Reply`'s client-facing
/// null-on-empty convention, since these bytes must replay through any
/// standard RESP reader.
fn encode_cmdline(buf: &mut BytesMut, args: &[Bytes]) {
    use bytes::BufMut;
    buf.put_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        buf.put_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.put_slice(arg);
        buf.put_slice(b"\r\n");
    }
}

/// Replay `path` against `engine` at boot, through a throwaway session.
/// Missing file is not an error (nothing to replay yet); a framing error
/// partway through stops replay at the last good command rather than
/// panicking, matching the teacher's "truncate and carry on" tolerance for
/// a file that may have been cut short by a crash mid-write.
pub async fn replay(path: impl AsRef<Path>, engine: &crate::cmd::Engine) -> io::Result<()> {
    let path: PathBuf = path.as_ref().to_path_buf();
    let file = match File::open(&path).await {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let mut parser = Parser::new(BufReader::new(file));
    let mut session = Session::new();
    loop {
        let Some(payload) = parser.next_payload().await else { break };
        if let Some(err) = payload.err {
            crate::log::warning!("stopping append-only file replay: {err}");
            break;
        }
        let Some(Reply::Array(items)) = payload.data else { continue };
        let args: Vec<Bytes> = items
            .into_iter()
            .filter_map(|r| match r {
                Reply::Bulk(b) => Some(b),
                _ => None,
            })
            .collect();
        if args.is_empty() {
            continue;
        }
        engine.exec(&mut session, &args);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_cmdline_matches_resp_wire_format() {
        let mut buf = BytesMut::new();
        encode_cmdline(&mut buf, &[Bytes::from_static(b"SET"), Bytes::from_static(b"k"), Bytes::from_static(b"v")]);
        assert_eq!(&buf[..], b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n");
    }

    #[tokio::test]
    async fn append_then_replay_round_trips_a_write() {
        let dir = tempfile::tempdir().unwrap();
        let sink = AofSink::open(dir.path().to_str().unwrap(), "test.aof", AppendFsync::Always).await.unwrap();
        sink.append(0, vec![Bytes::from_static(b"SET"), Bytes::from_static(b"k"), Bytes::from_static(b"v")]);
        // give the writer task a turn to drain the channel and fsync.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let engine = crate::cmd::Engine::new(crate::config::Config { databases: 1, ..Default::default() }, None);
        replay(dir.path().join("test.aof"), &engine).await.unwrap();

        let mut session = Session::new();
        let reply = engine.exec(&mut session, &[Bytes::from_static(b"GET"), Bytes::from_static(b"k")]);
        assert_eq!(reply, Reply::bulk(&b"v"[..]));
    }

    #[tokio::test]
    async fn replay_of_missing_file_is_a_noop() {
        let engine = crate::cmd::Engine::new(crate::config::Config { databases: 1, ..Default::default() }, None);
        replay("/nonexistent/path/to.aof", &engine).await.unwrap();
    }
}
