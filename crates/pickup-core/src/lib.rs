//! Core types, workflows, and trait definitions for the school pickup
//! service.
//!
//! The crate has no HTTP or database dependencies. The storage backend is
//! reached through [`store::PickupStore`] and QR images through
//! [`render::CodeRenderer`]; everything else is plain domain logic.

pub mod directory;
pub mod error;
pub mod guardian;
pub mod issuer;
pub mod logs;
pub mod pickup;
pub mod policy;
pub mod render;
pub mod store;
pub mod student;
pub mod sync;
pub mod verifier;

pub use error::{Error, Result};
