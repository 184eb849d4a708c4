//! Cluster overlay: consistent-hash routing (C4), pooled outbound clients
//! (C5/C5′), and the router (C8) that composes them with the standalone
//! engine.

pub mod client;
pub mod hash_ring;
pub mod pool;
pub mod router;

pub use router::Router;
