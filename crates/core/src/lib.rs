//! Bukka Core - Shared types library.
//!
//! This crate provides common types used across all Bukka components:
//! - `storefront` - Menu, cart, checkout and profile logic over the hosted platform
//! - `cli` - Command-line tools for browsing, ordering and seeding the menu
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no document store access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, categories and profile choices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
