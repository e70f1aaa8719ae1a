//! Test utilities for hooktrail services.
//!
//! Provides `MockAdmin` gateway headers and request/response helpers for
//! driving routers with `tower::ServiceExt::oneshot`.
//! Import from `[dev-dependencies]` only, never in production code.

pub mod auth;
pub mod http;
