//! Outbound pipelining RESP client (C5′): one TCP connection shared by
//! three cooperative tasks (writer, reader, heartbeat) plus a supervisor
//! that owns reconnect. Grounded on `original_source/cluster/communicate.go`'s
//! `relay`/`getPeerClient` (which the original leaves as TODOs pending a
//! real client type) and spec.md §4.5, which commits to the concrete task
//! split, retry counts, and timeouts the original never filled in.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;

use crate::resp::{Parser, Reply};

const SEND_TIMEOUT: Duration = Duration::from_secs(3);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const DIAL_ATTEMPTS: u32 = 3;
const DIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const WRITE_RETRIES: u32 = 3;
const PENDING_CAPACITY: usize = 1024;

struct PendingRequest {
    args: Vec<Bytes>,
    respond_to: Option<oneshot::Sender<Reply>>,
    heartbeat: bool,
}

/// A live handle to a peer. `send` is safe to call concurrently from many
/// callers; requests pipeline over the one underlying TCP connection.
pub struct Client {
    pending_tx: mpsc::Sender<PendingRequest>,
    closed: Arc<AtomicBool>,
}

impl Client {
    /// Dial `addr`, retrying up to `DIAL_ATTEMPTS` times at
    /// `DIAL_RETRY_DELAY` intervals. On final exhaustion of every future
    /// reconnect attempt, `on_exhausted` fires once so the owning pool can
    /// evict this peer.
    pub async fn connect(addr: String, on_exhausted: impl Fn() + Send + Sync + 'static) -> std::io::Result<Client> {
        let stream = dial_with_retry(&addr).await?;
        let (pending_tx, pending_rx) = mpsc::channel(PENDING_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(supervise(addr, stream, pending_rx, closed.clone(), Arc::new(on_exhausted)));

        Ok(Client { pending_tx, closed })
    }

    /// Send `args` and wait up to `SEND_TIMEOUT` for the reply. Returns a
    /// `-ERR` reply (never an `Err`) on timeout or if the client is closed,
    /// matching spec.md §4.5's "`Send` returns a reply synchronously."
    pub async fn send(&self, args: Vec<Bytes>) -> Reply {
        if self.closed.load(Ordering::Relaxed) {
            return Reply::error("ERR client closed");
        }
        let (tx, rx) = oneshot::channel();
        let req = PendingRequest { args, respond_to: Some(tx), heartbeat: false };
        if self.pending_tx.send(req).await.is_err() {
            return Reply::error("ERR client closed");
        }
        match timeout(SEND_TIMEOUT, rx).await {
            Ok(Ok(reply)) => reply,
            _ => Reply::error("ERR server time out"),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

async fn dial_with_retry(addr: &str) -> std::io::Result<TcpStream> {
    let mut last_err = None;
    for attempt in 0..DIAL_ATTEMPTS {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                crate::log::warning!("dial attempt {} to {addr} failed: {e}", attempt + 1);
                last_err = Some(e);
                tokio::time::sleep(DIAL_RETRY_DELAY).await;
            }
        }
    }
    Err(last_err.unwrap())
}

/// Owns the connection across its lifetime: spawns writer/reader/heartbeat
/// for the current socket, waits for the reader to signal a dead
/// connection, then reconnects (or gives up and calls `on_exhausted`).
async fn supervise(
    addr: String,
    mut stream: TcpStream,
    mut pending_rx: mpsc::Receiver<PendingRequest>,
    closed: Arc<AtomicBool>,
    on_exhausted: Arc<dyn Fn() + Send + Sync>,
) {
    loop {
        let waiting: Arc<Mutex<VecDeque<oneshot::Sender<Reply>>>> = Arc::new(Mutex::new(VecDeque::new()));
        let (read_half, mut write_half) = stream.into_split();

        let (died_tx, died_rx) = oneshot::channel::<()>();
        let reader_waiting = waiting.clone();
        let reader_task = tokio::spawn(async move {
            let mut parser = Parser::new(BufReader::new(read_half));
            loop {
                let Some(payload) = parser.next_payload().await else { break };
                let reply = match (payload.data, payload.err) {
                    (Some(r), _) => r,
                    (None, Some(e)) => Reply::error(format!("ERR {e}")),
                    (None, None) => continue,
                };
                let mut waiting = reader_waiting.lock().await;
                if let Some(tx) = waiting.pop_front() {
                    let _ = tx.send(reply);
                }
            }
            let _ = died_tx.send(());
        });

        // Pull requests off `pending_rx` until the connection dies, writing
        // each to the socket and queuing its responder for the reader.
        let mut died_rx = died_rx;
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        let connection_dead = loop {
            tokio::select! {
                _ = &mut died_rx => break true,
                _ = heartbeat.tick() => {
                    let (tx, _rx) = oneshot::channel();
                    if !write_request(&mut write_half, &waiting, PendingRequest {
                        args: vec![Bytes::from_static(b"PING")],
                        respond_to: Some(tx),
                        heartbeat: true,
                    }).await {
                        break true;
                    }
                }
                req = pending_rx.recv() => {
                    let Some(req) = req else { break false };
                    if !write_request(&mut write_half, &waiting, req).await {
                        break true;
                    }
                }
            }
        };
        reader_task.abort();

        if !connection_dead {
            // `pending_rx` closed: every `Client` handle was dropped.
            return;
        }

        // Fail every request still awaiting a reply before reconnecting.
        let mut waiting = waiting.lock().await;
        while let Some(tx) = waiting.pop_front() {
            let _ = tx.send(Reply::error("ERR connection closed"));
        }
        drop(waiting);

        match dial_with_retry(&addr).await {
            Ok(new_stream) => stream = new_stream,
            Err(_) => {
                closed.store(true, Ordering::Relaxed);
                on_exhausted();
                return;
            }
        }
    }
}

/// Serialize and write one request, retrying transient write failures up to
/// `WRITE_RETRIES` times. On persistent failure the request is failed
/// directly and `false` is returned to signal the connection is dead.
async fn write_request(
    write_half: &mut (impl AsyncWriteExt + Unpin),
    waiting: &Arc<Mutex<VecDeque<oneshot::Sender<Reply>>>>,
    mut req: PendingRequest,
) -> bool {
    let wire = Reply::Array(req.args.iter().cloned().map(Reply::Bulk).collect()).to_bytes();
    for _ in 0..WRITE_RETRIES {
        match write_half.write_all(&wire).await {
            Ok(()) => {
                if let Some(tx) = req.respond_to.take() {
                    // Every write, heartbeat included, must queue its
                    // responder: the reader pops `waiting` FIFO against the
                    // wire order of replies, so skipping the queue here
                    // would hand a heartbeat's PONG to the next real
                    // request's sender and cascade the misattribution
                    // through every reply after it. Nothing awaits the
                    // heartbeat's `rx`, so its reply is simply dropped once
                    // received.
                    waiting.lock().await.push_back(tx);
                }
                return true;
            }
            Err(e) => crate::log::warning!("write to peer failed, retrying: {e}"),
        }
    }
    if let Some(tx) = req.respond_to.take() {
        let _ = tx.send(Reply::error("ERR server time out"));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn send_round_trips_a_ping_against_an_echo_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut parser = Parser::new(BufReader::new(&mut sock));
            // one request expected: reply +PONG regardless of args.
            let _ = parser.next_payload().await;
            sock.write_all(b"+PONG\r\n").await.unwrap();
        });

        let client = Client::connect(addr.to_string(), || {}).await.unwrap();
        let reply = client.send(vec![Bytes::from_static(b"PING")]).await;
        assert_eq!(reply, Reply::pong());
    }

    #[tokio::test]
    async fn send_after_close_is_immediate_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });
        let client = Client::connect(addr.to_string(), || {}).await.unwrap();
        client.close();
        let reply = client.send(vec![Bytes::from_static(b"PING")]).await;
        assert_eq!(reply, Reply::error("ERR client closed"));
    }
}
