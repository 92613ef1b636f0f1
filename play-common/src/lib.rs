//! # PLAY Common Library
//!
//! Shared code for the PLAY audio allocation service:
//! - Common error type
//! - TOML configuration model and setting resolution
//! - SQLite database initialization (catalog store and audit log schema)
//! - Timestamp helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
