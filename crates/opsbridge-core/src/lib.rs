//! Core types and utilities for opsbridge
//!
//! # Modules
//!
//! - `config`: Configuration loading (files, environment overrides)
//! - `error`: Error types and Result alias
//! - `pagination`: Opaque cursor codec and windowed listing

pub mod config;
pub mod error;
pub mod pagination;

// Re-exports
pub use config::{AppConfig, AppConfigBuilder, BackendAuth, BackendConfig};
pub use error::{Error, Result};
pub use pagination::{decode_cursor, encode_cursor, paginate, Page};
