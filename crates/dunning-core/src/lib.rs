//! Ambient building blocks shared by every dunning service: configuration
//! loading, tracing setup, health probes, HTTP middleware and serde helpers.

pub mod config;
pub mod health;
pub mod middleware;
pub mod sea_ext;
pub mod serde;
pub mod tracing;
