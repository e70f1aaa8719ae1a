//! Identity types shared across hooktrail services.
//!
//! Authentication happens upstream; services only see gateway-injected
//! identity headers and turn them into an [`actor::Actor`].

pub mod actor;
pub mod identity;
