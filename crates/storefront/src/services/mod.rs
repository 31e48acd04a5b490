//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password accounts and bearer tokens
//! - `oauth` - Google sign-in
//! - `catalog` - Slugs and the category cache
//! - `orders` - Order engine (checkout, cancellation, status changes)
//! - `payments` - Payment gateway adapter (Midtrans Snap)

pub mod auth;
pub mod catalog;
pub mod oauth;
pub mod orders;
pub mod payments;
