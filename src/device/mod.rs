//! Hardware context module
//!
//! This module provides the pieces the discovery loop uses to talk to
//! hardware: context URIs, the scan backend trait, and the libiio backend.
//!
//! # Submodules
//!
//! - `uri` - Immutable context URIs and user input normalisation
//! - `traits` - `ContextScanner` abstraction and `ContextInfo`
//! - `iio` - libiio scan contexts (real hardware)
//!
//! Both the libiio backend and the mock scanners in `testdb` implement
//! `ContextScanner`, so the scanner works with either.

pub mod iio;
pub mod traits;
pub mod uri;

pub use iio::IioScanner;
pub use traits::{ContextInfo, ContextScanner};
pub use uri::ContextUri;
