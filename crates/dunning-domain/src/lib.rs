//! Domain types shared across the dunning services.
//!
//! This crate contains only pure types with no framework dependencies.
//! Import in `usecase/` and `domain/` layers; never in `infra/` or `handlers/`.

pub mod actor;
pub mod money;
pub mod pagination;
