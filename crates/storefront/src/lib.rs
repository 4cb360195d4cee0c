//! Bukka storefront library.
//!
//! Menu browsing, the per-user cart with checkout, and profile management on
//! top of a hosted document store, auth provider and object storage.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod platform;
pub mod profile;
pub mod services;
pub mod state;
