//! Server glue (C10): the Tokio accept loop, per-connection session
//! lifecycle, and graceful shutdown. Grounded on the teacher's
//! `server.rs`/`main.rs` bootstrap sequence (config load -> init ->
//! ready-log -> accept), replayed over Tokio instead of the teacher's
//! hand-rolled `ae` event loop, and on spec.md §4.9/§5 for the
//! read-dispatch-buffer-flush loop and shutdown contract.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Semaphore};

use crate::cluster::Router;
use crate::cmd::Engine;
use crate::config::Config;
use crate::resp::{Parser, Reply};
use crate::session::{self, Session};

/// The two ways a server can be wired: standalone (`Engine::exec` is
/// synchronous) or cluster-routed (`Router::exec` goes through relay, so
/// it's async). Presenting one `exec` surface here keeps the accept loop
/// and connection handler ignorant of which mode is running.
pub enum Backend {
    Standalone(Engine),
    Cluster(Router),
}

impl Backend {
    fn engine(&self) -> &Engine {
        match self {
            Backend::Standalone(e) => e,
            Backend::Cluster(r) => r.engine(),
        }
    }

    async fn exec(&self, session: &mut Session, args: &[Bytes]) -> Reply {
        match self {
            Backend::Standalone(e) => e.exec(session, args),
            Backend::Cluster(r) => r.exec(session, args).await,
        }
    }

    fn on_connect(&self) {
        self.engine().on_connect();
    }

    fn on_disconnect(&self) {
        self.engine().on_disconnect();
    }

    /// Graceful shutdown's "close the engine" step: clears every keyspace
    /// and drops the AOF sink.
    fn close(&self) {
        self.engine().close();
    }
}

/// How long the accept loop waits, after broadcasting shutdown, for
/// in-flight sessions to notice and flush before closing the engine
/// regardless (spec.md §5: "flush outstanding output best-effort").
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

pub struct Server {
    backend: Arc<Backend>,
    bind: String,
    port: u16,
    maxclients: u32,
}

impl Server {
    pub fn new(backend: Backend, config: &Config) -> Self {
        Server { backend: Arc::new(backend), bind: config.bind.clone(), port: config.port, maxclients: config.maxclients }
    }

    /// Bind and accept until a shutdown signal arrives, then close every
    /// live session and the engine before returning.
    pub async fn run(self) -> std::io::Result<()> {
        let addr = format!("{}:{}", self.bind, self.port);
        let listener = TcpListener::bind(&addr).await?;
        crate::log::notice!("ferrite listening on {addr}");

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let permits = Arc::new(Semaphore::new(self.maxclients.max(1) as usize));
        let live = Arc::new(AtomicU64::new(0));

        loop {
            tokio::select! {
                biased;

                _ = shutdown_signal() => {
                    crate::log::notice!("shutdown signal received, closing sessions");
                    break;
                }

                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            crate::log::warning!("accept failed: {e}");
                            continue;
                        }
                    };

                    let permit = match permits.clone().try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            crate::log::warning!("rejecting {peer}: max number of clients reached");
                            tokio::spawn(reject_max_clients(stream));
                            continue;
                        }
                    };

                    let backend = self.backend.clone();
                    let shutdown_rx = shutdown_tx.subscribe();
                    let live = live.clone();
                    live.fetch_add(1, Ordering::Relaxed);

                    tokio::spawn(async move {
                        let _permit = permit;
                        handle_connection(stream, &backend, shutdown_rx).await;
                        live.fetch_sub(1, Ordering::Relaxed);
                    });
                }
            }
        }

        let _ = shutdown_tx.send(());
        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while live.load(Ordering::Relaxed) > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.backend.close();
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn reject_max_clients(mut stream: TcpStream) {
    let _ = stream.write_all(&Reply::error("ERR max number of clients reached").to_bytes()).await;
}

/// One connection's life: created on accept, fed through the parser
/// (§4.1), dispatched through `backend.exec`, buffered and flushed per
/// §4.9's threshold/timer/batch-drain triggers, destroyed on parser EOF,
/// I/O error, or server shutdown (§4.9 point 4).
async fn handle_connection(stream: TcpStream, backend: &Backend, mut shutdown_rx: broadcast::Receiver<()>) {
    let _ = stream.set_nodelay(true);
    backend.on_connect();

    let (read_half, mut write_half) = stream.into_split();
    let mut parser = Parser::new(BufReader::new(read_half));
    let mut session = Session::new();

    let mut flush_timer = tokio::time::interval(session::FLUSH_INTERVAL);
    flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    'conn: loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                session.mark_closing();
                break 'conn;
            }

            _ = flush_timer.tick(), if session.has_pending_output() => {
                if session.flush(&mut write_half).await.is_err() {
                    break 'conn;
                }
            }

            payload = parser.next_payload() => {
                let Some(payload) = payload else { break 'conn };

                if let Some(err) = payload.err {
                    session.enqueue(&Reply::error(format!("ERR Protocol error: {err}")).to_bytes());
                } else {
                    match payload.data {
                        Some(Reply::Array(items)) => {
                            let args: Vec<Bytes> = items
                                .into_iter()
                                .filter_map(|r| match r {
                                    Reply::Bulk(b) => Some(b),
                                    _ => None,
                                })
                                .collect();
                            if !args.is_empty() {
                                let reply = backend.exec(&mut session, &args).await;
                                session.enqueue(&reply.to_bytes());
                            }
                        }
                        _ => {
                            // The server accepts only array-form requests
                            // (spec.md §6); anything else is a protocol
                            // violation from a client's perspective.
                            session.enqueue(
                                &Reply::error("ERR Protocol error: expected array request").to_bytes(),
                            );
                        }
                    }
                }

                // Never let pending output grow past the threshold even
                // mid-batch; the timer branch above covers the
                // fully-drained case once the read would otherwise block.
                if session.should_flush_by_size() && session.flush(&mut write_half).await.is_err() {
                    break 'conn;
                }
            }
        }
    }

    let _ = session.flush(&mut write_half).await;
    let _ = write_half.shutdown().await;
    backend.on_disconnect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::Engine;
    use tokio::io::{AsyncReadExt, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    async fn spawn_standalone_server() -> (std::net::SocketAddr, tokio::task::JoinHandle<std::io::Result<()>>) {
        let config = Config { bind: "127.0.0.1".to_string(), port: 0, databases: 4, ..Config::default() };
        let engine = Engine::new(config.clone(), None);
        let listener = TcpListener::bind((config.bind.as_str(), 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let server = Server::new(Backend::Standalone(engine), &Config { port: addr.port(), ..config });
        let handle = tokio::spawn(server.run());
        tokio::time::sleep(Duration::from_millis(30)).await;
        (addr, handle)
    }

    #[tokio::test]
    async fn end_to_end_set_then_get() {
        let (addr, _handle) = spawn_standalone_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n").await.unwrap();
        stream.write_all(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").await.unwrap();

        let mut buf = vec![0u8; 256];
        // two flushes may arrive as separate reads under the 1ms timer;
        // read until both expected replies have shown up.
        let mut received = Vec::new();
        while received.len() < b"+OK\r\n$3\r\nbar\r\n".len() {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed early");
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, b"+OK\r\n$3\r\nbar\r\n");
    }

    #[tokio::test]
    async fn malformed_request_gets_an_error_and_connection_stays_open() {
        let (addr, _handle) = spawn_standalone_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"*x\r\n").await.unwrap();
        stream.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();

        let mut buf = vec![0u8; 256];
        let mut received = Vec::new();
        while !received.ends_with(b"+PONG\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0);
            received.extend_from_slice(&buf[..n]);
        }
        assert!(String::from_utf8_lossy(&received).starts_with("-ERR"));
    }
}
