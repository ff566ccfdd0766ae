//! Test utilities for dunning services.
//!
//! Provides `MockTenant` for gateway headers and JSON payload fixtures.
//! Import from dev-dependencies only, never from production code.

pub mod fixture;
pub mod tenant;
