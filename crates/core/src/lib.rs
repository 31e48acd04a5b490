//! Nexora Core - shared domain types.
//!
//! Used by every Nexora component:
//! - `storefront` - the JSON API server
//! - `cli` - migrations, seeding and operator commands
//! - `integration-tests` - database-backed property tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Order totals arithmetic and the status state
//! machines live here so they can be tested without any infrastructure.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, prices, statuses and purchasers
//! - [`pricing`] - Shipping policy and order totals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use pricing::{OrderTotals, ShippingPolicy};
pub use types::*;
