//! Per-peer connection pool (C5): borrow/return semantics over a small
//! number of `Client` connections to one peer, with a pluggable factory and
//! a cap on outstanding borrows. Grounded on
//! `original_source/cluster/client_pool.go`'s `connectionFactory`
//! (`MakeObject`/`DestroyObject`/`ValidateObject`), reimplemented without
//! `go-commons-pool` since this crate pools a handful of long-lived
//! pipelining clients rather than short-lived request-scoped ones.

use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};

use crate::cluster::client::Client;
use crate::resp::Reply;

/// Maximum clients concurrently borrowed from one peer's pool.
const MAX_OUTSTANDING: usize = 32;

/// A borrowed client, returned to the pool's idle set on drop.
pub struct Borrowed {
    client: Option<Arc<Client>>,
    idle: Arc<Mutex<Vec<Arc<Client>>>>,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl Drop for Borrowed {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            if !client.is_closed() {
                let idle = self.idle.clone();
                tokio::spawn(async move { idle.lock().await.push(client) });
            }
        }
    }
}

impl std::ops::Deref for Borrowed {
    type Target = Client;
    fn deref(&self) -> &Client {
        self.client.as_ref().expect("client taken only on drop")
    }
}

/// One peer's pool. `borrow` returns an existing idle client or dials a new
/// one up to `MAX_OUTSTANDING`; beyond that, borrowers queue on the
/// semaphore until one is returned.
pub struct Pool {
    addr: String,
    idle: Arc<Mutex<Vec<Arc<Client>>>>,
    permits: Arc<Semaphore>,
    on_exhausted: Arc<dyn Fn() + Send + Sync>,
}

impl Pool {
    pub fn new(addr: String, on_exhausted: impl Fn() + Send + Sync + 'static) -> Self {
        Pool {
            addr,
            idle: Arc::new(Mutex::new(Vec::new())),
            permits: Arc::new(Semaphore::new(MAX_OUTSTANDING)),
            on_exhausted: Arc::new(on_exhausted),
        }
    }

    /// Borrow a client, dialing a fresh one if the idle set is empty.
    /// Borrow failures (connect errors) propagate to the caller so they can
    /// be turned into a RESP error reply, per spec.md §4.5.
    pub async fn borrow(&self) -> std::io::Result<Borrowed> {
        let permit = self.permits.clone().acquire_owned().await.expect("semaphore never closed");
        let existing = self.idle.lock().await.pop();
        let client = match existing {
            Some(c) => c,
            None => {
                let on_exhausted = self.on_exhausted.clone();
                Arc::new(Client::connect(self.addr.clone(), move || (on_exhausted)()).await?)
            }
        };
        Ok(Borrowed { client: Some(client), idle: self.idle.clone(), _permit: permit })
    }

    /// Send `args` through a borrowed client, returning it on every exit
    /// path (normal return or error), matching spec.md §4.5's "relay" and
    /// the teacher's `defer`-based `returnPeerClient`.
    pub async fn send(&self, args: Vec<bytes::Bytes>) -> Reply {
        match self.borrow().await {
            Ok(client) => client.send(args).await,
            Err(e) => Reply::error(format!("ERR {e}")),
        }
    }
}
