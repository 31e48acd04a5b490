//! Core types for Nexora.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod purchaser;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::Price;
pub use purchaser::{GuestContact, Purchaser};
pub use status::*;
