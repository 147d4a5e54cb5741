//! libiio scan backend
//!
//! Enumerates hardware contexts through libiio scan contexts (via the
//! `industrial-io` bindings). Linking against libiio is opt-in through the
//! `libiio` cargo feature; without it every transport reports itself as
//! unavailable, which the discovery loop treats as "nothing found".

use crate::core::error::{DiscoveryError, Result};
use crate::device::traits::{ContextInfo, ContextScanner};
use log::debug;

#[cfg(feature = "libiio")]
use industrial_io as iio;

/// Scanner backed by the system libiio
#[derive(Debug, Clone, Copy, Default)]
pub struct IioScanner;

impl IioScanner {
    pub fn new() -> Self {
        Self
    }

    /// Whether this build can reach real hardware
    pub fn is_available() -> bool {
        cfg!(feature = "libiio")
    }
}

#[cfg(feature = "libiio")]
impl ContextScanner for IioScanner {
    fn scan(&self, backend: &str) -> Result<Vec<ContextInfo>> {
        log::trace!("Creating scan context for '{}'", backend);

        // The scan context owns the info list and frees both on drop
        let scan_ctx = iio::ScanContext::new(backend)
            .map_err(|e| DiscoveryError::transport(backend, e.to_string()))?;

        let contexts: Vec<ContextInfo> = scan_ctx
            .iter()
            .map(|ctx| ContextInfo {
                uri: ctx.0.to_string(),
                description: ctx.1.to_string(),
            })
            .collect();

        debug!("{} context(s) found on '{}'", contexts.len(), backend);
        Ok(contexts)
    }

    fn name(&self) -> &str {
        "libiio"
    }
}

#[cfg(not(feature = "libiio"))]
impl ContextScanner for IioScanner {
    fn scan(&self, backend: &str) -> Result<Vec<ContextInfo>> {
        debug!("Skipping '{}' scan: built without libiio", backend);
        Err(DiscoveryError::transport(
            backend,
            "built without libiio support (enable the `libiio` feature)",
        ))
    }

    fn name(&self) -> &str {
        "libiio"
    }
}

#[cfg(all(test, not(feature = "libiio")))]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_without_libiio_reports_transport_unavailable() {
        let scanner = IioScanner::new();
        assert!(!IioScanner::is_available());

        let err = scanner.scan("usb").unwrap_err();
        assert!(matches!(err, DiscoveryError::TransportUnavailable { .. }));
        assert_eq!(err.backend(), Some("usb"));
    }
}
