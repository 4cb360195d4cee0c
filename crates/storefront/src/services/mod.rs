//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Account registration, sign-in and sign-out

pub mod auth;
