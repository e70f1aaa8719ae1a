//! Domain types shared across hooktrail crates.
//!
//! Pure types with no framework dependencies. Import in `usecase/` and
//! `domain/` layers; `infra/` converts to and from them at the edge.

pub mod id;
pub mod pagination;
