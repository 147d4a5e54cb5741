//! Mock scan backend for testing without hardware
//!
//! `MockScanner` implements `ContextScanner` over an in-memory list of
//! "plugged" contexts per transport. Tests and the `--simulate` mode mutate
//! that list between cycles, inject transport or scan failures, add latency,
//! and read back how the scanner was driven.

use crate::core::error::{DiscoveryError, Result};
use crate::device::{ContextInfo, ContextScanner};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Failure a mock transport reports instead of its contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// The scan context cannot be created
    TransportUnavailable,
    /// The scan context opens but listing fails
    ScanFailed,
}

impl MockFailure {
    fn to_error(self, backend: &str) -> DiscoveryError {
        match self {
            MockFailure::TransportUnavailable => {
                DiscoveryError::transport(backend, "simulated: unable to create scan context")
            }
            MockFailure::ScanFailed => {
                DiscoveryError::scan(backend, "simulated: iio_scan_context_get_info_list failed")
            }
        }
    }
}

/// Configuration for mock scanner behavior
#[derive(Debug, Clone, Default)]
pub struct MockScanConfig {
    /// Time each `scan` call blocks for
    pub latency: Duration,
    /// Random scan failures (percentage 0-100)
    pub random_failure_rate: u8,
    /// Contexts that may randomly appear/disappear on each scan
    pub churn_pool: Vec<(String, ContextInfo)>,
}

#[derive(Debug, Default)]
struct MockState {
    /// Plugged contexts per transport, in plug order
    contexts: HashMap<String, Vec<ContextInfo>>,
    /// Forced failures per transport
    failures: HashMap<String, MockFailure>,
}

/// In-memory `ContextScanner`
#[derive(Debug, Default)]
pub struct MockScanner {
    state: Mutex<MockState>,
    config: MockScanConfig,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockScanner {
    /// Create a mock with nothing plugged in
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock with specific configuration
    pub fn with_config(config: MockScanConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Make every scan block for `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.config.latency = latency;
        self
    }

    /// Fail a percentage of scans at random
    pub fn with_random_failure_rate(mut self, percent: u8) -> Self {
        self.config.random_failure_rate = percent.min(100);
        self
    }

    /// Let a context randomly come and go on each scan
    pub fn with_churn(mut self, backend: &str, info: ContextInfo) -> Self {
        self.config.churn_pool.push((backend.to_string(), info));
        self
    }

    /// Plug a context in on `backend`. Plugging the same URI twice makes the
    /// scan report it twice.
    pub fn plug(&self, backend: &str, uri: &str, description: &str) {
        let mut state = self.lock();
        state
            .contexts
            .entry(backend.to_string())
            .or_default()
            .push(ContextInfo::new(uri, description));
    }

    /// Remove every entry with `uri` from every transport
    pub fn unplug(&self, uri: &str) -> bool {
        let mut state = self.lock();
        let mut removed = false;
        for list in state.contexts.values_mut() {
            let before = list.len();
            list.retain(|ctx| ctx.uri != uri);
            removed |= list.len() != before;
        }
        removed
    }

    /// Remove everything from every transport
    pub fn unplug_all(&self) {
        self.lock().contexts.clear();
    }

    /// Force (or clear) a failure on one transport
    pub fn set_failure(&self, backend: &str, failure: Option<MockFailure>) {
        let mut state = self.lock();
        match failure {
            Some(f) => {
                state.failures.insert(backend.to_string(), f);
            }
            None => {
                state.failures.remove(backend);
            }
        }
    }

    /// URIs currently plugged on `backend`
    pub fn plugged(&self, backend: &str) -> Vec<String> {
        self.lock()
            .contexts
            .get(backend)
            .map(|list| list.iter().map(|ctx| ctx.uri.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of `scan` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of `scan` calls that ever ran at the same time
    pub fn max_concurrent_scans(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Toggle one random churn entry of `backend`
    fn churn(&self, backend: &str) {
        let pool: Vec<&ContextInfo> = self
            .config
            .churn_pool
            .iter()
            .filter(|(b, _)| b.as_str() == backend)
            .map(|(_, info)| info)
            .collect();
        if pool.is_empty() {
            return;
        }
        let info = pool[rand::thread_rng().gen_range(0..pool.len())];
        if !self.unplug(&info.uri) {
            self.plug(backend, &info.uri, &info.description);
        }
    }
}

impl ContextScanner for MockScanner {
    fn scan(&self, backend: &str) -> Result<Vec<ContextInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if !self.config.latency.is_zero() {
            thread::sleep(self.config.latency);
        }

        let result = self.scan_state(backend);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &str {
        "mock"
    }
}

impl MockScanner {
    fn scan_state(&self, backend: &str) -> Result<Vec<ContextInfo>> {
        if self.config.random_failure_rate > 0 {
            let roll: u8 = rand::thread_rng().gen_range(0..100);
            if roll < self.config.random_failure_rate {
                return Err(MockFailure::ScanFailed.to_error(backend));
            }
        }

        self.churn(backend);

        let state = self.lock();
        if let Some(failure) = state.failures.get(backend) {
            return Err(failure.to_error(backend));
        }

        Ok(state.contexts.get(backend).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plug_and_scan() {
        let mock = MockScanner::new();
        mock.plug("usb", "usb:1.2.3", "ADALM2000");
        mock.plug("ip", "ip:192.168.2.1", "PlutoSDR");

        let usb = mock.scan("usb").unwrap();
        assert_eq!(usb, vec![ContextInfo::new("usb:1.2.3", "ADALM2000")]);
        assert!(mock.scan("local").unwrap().is_empty());
        assert_eq!(mock.calls(), 2);
    }

    #[test]
    fn test_unplug() {
        let mock = MockScanner::new();
        mock.plug("usb", "usb:1", "a");
        mock.plug("usb", "usb:1", "a");
        mock.plug("usb", "usb:2", "b");

        assert!(mock.unplug("usb:1"));
        assert!(!mock.unplug("usb:1"));
        assert_eq!(mock.plugged("usb"), vec!["usb:2"]);

        mock.unplug_all();
        assert!(mock.plugged("usb").is_empty());
    }

    #[test]
    fn test_forced_failures() {
        let mock = MockScanner::new();
        mock.plug("usb", "usb:1", "a");

        mock.set_failure("usb", Some(MockFailure::TransportUnavailable));
        assert!(matches!(
            mock.scan("usb"),
            Err(DiscoveryError::TransportUnavailable { .. })
        ));

        mock.set_failure("usb", Some(MockFailure::ScanFailed));
        assert!(matches!(
            mock.scan("usb"),
            Err(DiscoveryError::ScanFailed { .. })
        ));

        mock.set_failure("usb", None);
        assert_eq!(mock.scan("usb").unwrap().len(), 1);
    }

    #[test]
    fn test_full_failure_rate() {
        let mock = MockScanner::new().with_random_failure_rate(100);
        mock.plug("usb", "usb:1", "a");
        for _ in 0..10 {
            assert!(mock.scan("usb").is_err());
        }
    }

    #[test]
    fn test_churn_toggles_presence() {
        let mock = MockScanner::new().with_churn("usb", ContextInfo::new("usb:9", "SWIOT"));

        let first = mock.scan("usb").unwrap();
        let second = mock.scan("usb").unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn test_churn_only_on_its_own_transport() {
        let mock = MockScanner::new().with_churn("usb", ContextInfo::new("usb:9", "SWIOT"));

        for _ in 0..5 {
            assert!(mock.scan("ip").unwrap().is_empty());
        }
        assert!(mock.plugged("usb").is_empty());

        assert_eq!(mock.scan("usb").unwrap().len(), 1);
        assert!(mock.scan("ip").unwrap().is_empty());
        assert_eq!(mock.plugged("usb"), vec!["usb:9"]);
    }

    #[test]
    fn test_concurrency_tracking() {
        let mock = std::sync::Arc::new(MockScanner::new().with_latency(Duration::from_millis(50)));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let mock = std::sync::Arc::clone(&mock);
                thread::spawn(move || mock.scan("usb"))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(mock.calls(), 2);
        assert!(mock.max_concurrent_scans() >= 1);
    }
}
