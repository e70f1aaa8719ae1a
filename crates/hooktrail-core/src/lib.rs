//! Building blocks shared by every hooktrail service: the common error type,
//! health probes, request-id / trace middleware, tracing bootstrap, client
//! metadata extraction and serde helpers.

pub mod client;
pub mod error;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
