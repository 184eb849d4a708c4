//! The RESP wire protocol: parsing (`parser`) and serialization (`reply`).

pub mod parser;
pub mod reply;

pub use parser::{Parser, Payload};
pub use reply::Reply;
