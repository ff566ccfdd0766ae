//! Tenant context shared across dunning services.
//!
//! Provides the `TenantHeaders` extractor for gateway-injected organisation
//! and actor headers.

pub mod identity;
