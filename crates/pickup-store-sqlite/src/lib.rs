//! SQLite backend for the pickup store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every trait method runs as a single
//! closure on that thread, and multi-statement writes run inside one
//! transaction, which gives per-call atomicity.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
