//! Scan backend abstraction for testability
//!
//! The periodic scanner only needs one capability from the hardware layer:
//! enumerate the contexts reachable over a named transport. This module
//! defines that capability as a trait so the libiio backend, the mock
//! scanners in `testdb`, and anything else can be used interchangeably.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use iio_discovery::device::traits::ContextScanner;
//!
//! fn print_usb_contexts<S: ContextScanner>(scanner: &S) {
//!     match scanner.scan("usb") {
//!         Ok(contexts) => {
//!             for ctx in contexts {
//!                 println!("{} [{}]", ctx.description, ctx.uri);
//!             }
//!         }
//!         Err(e) => eprintln!("{}", e),
//!     }
//! }
//! ```

use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::sync::Arc;

/// One entry of a scan: where the context lives and what it says it is
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextInfo {
    /// URI to open the context with
    pub uri: String,
    /// Human readable description reported by the transport
    pub description: String,
}

impl ContextInfo {
    /// Create a new ContextInfo
    pub fn new(uri: &str, description: &str) -> Self {
        Self {
            uri: uri.to_string(),
            description: description.to_string(),
        }
    }
}

impl Display for ContextInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.uri)
        } else {
            write!(f, "{} [{}]", self.description, self.uri)
        }
    }
}

/// Enumerates hardware contexts on a transport
///
/// `scan` is a blocking call. Implementations open a scan context for the
/// transport, list the context descriptors and release the scan context
/// before returning, whether or not the listing succeeded.
pub trait ContextScanner {
    /// Enumerate the contexts reachable over `backend` ("usb", "ip", ...)
    fn scan(&self, backend: &str) -> Result<Vec<ContextInfo>>;

    /// Short name for log messages
    fn name(&self) -> &str {
        "scanner"
    }
}

impl<S: ContextScanner + ?Sized> ContextScanner for Arc<S> {
    fn scan(&self, backend: &str) -> Result<Vec<ContextInfo>> {
        (**self).scan(backend)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<S: ContextScanner + ?Sized> ContextScanner for Box<S> {
    fn scan(&self, backend: &str) -> Result<Vec<ContextInfo>> {
        (**self).scan(backend)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
