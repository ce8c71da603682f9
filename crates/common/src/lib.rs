//! Shared types and error definitions used across the herald crates.

pub mod error;
pub mod file;
pub mod types;

pub use error::{Error, FromMessage, Result};
