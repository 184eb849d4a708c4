//! Cluster router (C8): the same `exec` surface as the standalone engine,
//! composed with key-to-peer routing. Grounded on
//! `original_source/cluster/router.go` (`makeRouter`'s per-command strategy
//! functions: `defaultFunc`/`ping`/`rename`/`flushdb`/`del`/`selectDB`) and
//! `communicate.go` (`relay`/`broadcast`), both of which the original
//! leaves largely as stubs or TODOs (`getPeerClient`'s type assertion,
//! `relay`'s unfinished `Send`) — this spec commits to the completed
//! behavior spec.md §4.8 describes, including the `ADDNODE` propagation
//! protocol and the pool eviction hook the original never wires up.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::cluster::hash_ring::HashRing;
use crate::cluster::pool::Pool;
use crate::cmd::Engine;
use crate::config::Config;
use crate::error::RedisError;
use crate::resp::Reply;
use crate::session::Session;

struct ClusterState {
    nodes: Vec<String>,
    ring: HashRing,
    pools: HashMap<String, Arc<Pool>>,
}

/// The cluster-mode entry point. Wraps a standalone `Engine` for local
/// execution and a pool-per-peer map for relay, behind a single
/// `tokio::sync::RwLock` since membership changes (`ADDNODE`, eviction) are
/// rare compared to routing lookups.
pub struct Router {
    self_addr: String,
    engine: Engine,
    state: Arc<RwLock<ClusterState>>,
}

impl Router {
    pub fn new(config: Config, aof: Option<crate::aof::AofSink>) -> Self {
        let self_addr = config.cluster_self.clone().expect("cluster mode requires the `self` config key");
        let replicas = config.cluster_replicas as usize;

        let mut nodes = config.cluster_peers.clone();
        nodes.push(self_addr.clone());

        let engine = Engine::new(config, aof);
        let state = Arc::new(RwLock::new(ClusterState { nodes: Vec::new(), ring: HashRing::new(replicas), pools: HashMap::new() }));
        let router = Router { self_addr: self_addr.clone(), engine, state: state.clone() };

        let mut ring = HashRing::new(replicas);
        let mut pools = HashMap::new();
        for node in &nodes {
            ring.add_node(node);
            if node != &self_addr {
                pools.insert(node.clone(), Arc::new(router.make_pool(node.clone())));
            }
        }

        // No other task can be touching `state` yet, so a non-blocking
        // write lock attempt always succeeds here; this avoids pulling in
        // an async runtime dependency just to initialize the struct.
        let mut guard = state.try_write().expect("router state uncontended during construction");
        guard.nodes = nodes;
        guard.ring = ring;
        guard.pools = pools;
        drop(guard);

        router
    }

    fn make_pool(&self, peer: String) -> Pool {
        let state = self.state.clone();
        let evicted = peer.clone();
        Pool::new(peer, move || {
            let state = state.clone();
            let evicted = evicted.clone();
            tokio::spawn(async move {
                let mut state = state.write().await;
                state.nodes.retain(|n| n != &evicted);
                state.ring.remove_node(&evicted);
                state.pools.remove(&evicted);
                crate::log::notice!("evicted unreachable cluster peer {evicted}");
            });
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Wire up the AOF sink after boot-time replay has already populated
    /// the local keyspace, mirroring `Engine::attach_aof`.
    pub fn attach_aof(&mut self, sink: crate::aof::AofSink) {
        self.engine.attach_aof(sink);
    }

    /// spec.md §4.8's routing table, dispatched on the lowercased command
    /// name.
    pub async fn exec(&self, session: &mut Session, args: &[Bytes]) -> Reply {
        let Some(first) = args.first() else {
            return RedisError::UnknownCommand(String::new()).into_reply();
        };
        let name = String::from_utf8_lossy(first).to_ascii_lowercase();

        match name.as_str() {
            "ping" | "hello" | "select" => self.engine.exec(session, args),
            "get" | "set" | "setnx" | "getset" | "exists" | "type" => self.default_relay(session, args).await,
            "del" => self.del(session, args).await,
            "rename" | "renamenx" => self.rename_guard(session, args).await,
            "flushdb" => self.flushdb(session, args).await,
            "addnode" => self.addnode(session, args).await,
            _ => RedisError::UnsupportedCommand.into_reply(),
        }
    }

    async fn peer_for(&self, key: &[u8]) -> Option<String> {
        self.state.read().await.ring.pick(key).map(str::to_string)
    }

    async fn default_relay(&self, session: &mut Session, args: &[Bytes]) -> Reply {
        let Some(key) = args.get(1) else {
            // Missing key argument: let the local engine produce the
            // correct arity error rather than re-deriving arity here.
            return self.engine.exec(session, args);
        };
        match self.peer_for(key).await {
            Some(peer) if peer == self.self_addr => self.engine.exec(session, args),
            Some(peer) => self.relay(&peer, session, args).await,
            None => RedisError::Other("no cluster node available".to_string()).into_reply(),
        }
    }

    async fn del(&self, session: &mut Session, args: &[Bytes]) -> Reply {
        if args.len() < 2 {
            return RedisError::WrongArity("del".to_string()).into_reply();
        }
        let mut total = 0i64;
        for key in &args[1..] {
            let single = [Bytes::from_static(b"DEL"), key.clone()];
            let reply = match self.peer_for(key).await {
                Some(peer) if peer == self.self_addr => self.engine.exec(session, &single),
                Some(peer) => self.relay(&peer, session, &single).await,
                None => return RedisError::Other("no cluster node available".to_string()).into_reply(),
            };
            match reply {
                Reply::Integer(n) => total += n,
                Reply::Error(e) => return Reply::Error(e),
                _ => return RedisError::Other("unexpected reply relaying DEL".to_string()).into_reply(),
            }
        }
        Reply::Integer(total)
    }

    async fn rename_guard(&self, session: &mut Session, args: &[Bytes]) -> Reply {
        if args.len() != 3 {
            let name = String::from_utf8_lossy(&args[0]).to_ascii_lowercase();
            return RedisError::WrongArity(name).into_reply();
        }
        let src_peer = self.peer_for(&args[1]).await;
        let dst_peer = self.peer_for(&args[2]).await;
        match (src_peer, dst_peer) {
            (Some(s), Some(d)) if s == d => {
                if s == self.self_addr {
                    self.engine.exec(session, args)
                } else {
                    self.relay(&s, session, args).await
                }
            }
            _ => RedisError::CrossNodeRename.into_reply(),
        }
    }

    async fn flushdb(&self, session: &mut Session, args: &[Bytes]) -> Reply {
        let nodes = self.state.read().await.nodes.clone();
        let mut first_err: Option<String> = None;
        for node in nodes {
            let reply = if node == self.self_addr { self.engine.exec(session, args) } else { self.relay(&node, session, args).await };
            if let Reply::Error(e) = reply {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Reply::Error(e),
            None => Reply::ok(),
        }
    }

    /// `ADDNODE <peer>... [broadcast]` (spec.md §4.8).
    async fn addnode(&self, session: &mut Session, args: &[Bytes]) -> Reply {
        if args.len() < 2 {
            return RedisError::WrongArity("addnode".to_string()).into_reply();
        }
        let is_trailer = args.last().map(|a| a.as_ref() == b"broadcast").unwrap_or(false);
        let end = if is_trailer { args.len() - 1 } else { args.len() };
        let candidates: Vec<String> = args[1..end].iter().map(|b| String::from_utf8_lossy(b).into_owned()).collect();

        let new_peers: Vec<String> = {
            let state = self.state.read().await;
            candidates.into_iter().filter(|p| !state.nodes.contains(p)).collect()
        };

        if !new_peers.is_empty() {
            let mut state = self.state.write().await;
            for peer in &new_peers {
                state.nodes.push(peer.clone());
                state.ring.add_node(peer);
                if peer != &self.self_addr {
                    let pool = self.make_pool(peer.clone());
                    state.pools.insert(peer.clone(), Arc::new(pool));
                }
            }
        }

        // Only the entry point (no `broadcast` trailer) propagates; the
        // trailer on the re-sent command prevents recursion.
        if !is_trailer {
            let all_nodes = self.state.read().await.nodes.clone();
            let mut propagate: Vec<Bytes> = vec![Bytes::from_static(b"ADDNODE")];
            propagate.extend(all_nodes.iter().map(|n| Bytes::copy_from_slice(n.as_bytes())));
            propagate.push(Bytes::from_static(b"broadcast"));

            for node in all_nodes {
                if node == self.self_addr {
                    continue;
                }
                let reply = self.relay(&node, session, &propagate).await;
                if let Reply::Error(e) = reply {
                    crate::log::warning!("ADDNODE propagation to {node} failed: {e}");
                }
            }
        }

        Reply::ok()
    }

    /// Borrow a single client for `peer`, send `SELECT <sessionDB>` then
    /// `args` on that same connection, returning the remote reply verbatim.
    /// Both sends must share one client: a pooled connection stays on
    /// whatever DB the last `SELECT` left it on, so issuing the `SELECT` and
    /// the command against two different borrowed connections would select
    /// one socket's DB and run the command on another's. The pool returns
    /// the client on every exit path via `Borrowed`'s `Drop`.
    async fn relay(&self, peer: &str, session: &Session, args: &[Bytes]) -> Reply {
        let pool = self.state.read().await.pools.get(peer).cloned();
        let Some(pool) = pool else {
            return RedisError::Other(format!("unknown peer '{peer}'")).into_reply();
        };
        let client = match pool.borrow().await {
            Ok(client) => client,
            Err(e) => return Reply::error(format!("ERR {e}")),
        };
        let select = client.send(vec![Bytes::from_static(b"SELECT"), Bytes::from(session.db_index().to_string())]).await;
        if select.is_error() {
            return select;
        }
        client.send(args.to_vec()).await
    }
}
