//! Core types and trait definitions for the Tessera authorization service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod chat;
pub mod context;
pub mod error;
pub mod format;
pub mod identity;
pub mod permission_set;
pub mod profile;
pub mod resolver;
pub mod role;
pub mod selector;
pub mod store;
pub mod tenant;

pub use error::{Error, Result};
