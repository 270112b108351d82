//! SQLite backend for the Tessera directory.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime.

mod encode;
mod schema;
mod seed;
mod stamp;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
