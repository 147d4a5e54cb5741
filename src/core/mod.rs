//! Core functionality module
//!
//! Configuration management and error handling shared by the scan backends,
//! the discovery loop and the command-line front-end.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and validation
//! - `error` - Error types and result aliases

pub mod config;
pub mod error;
