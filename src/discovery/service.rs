//! Discovery service
//!
//! Composition root for context discovery: owns one [`Scanner`] and one
//! [`Collector`], feeds every delivered scan into the collector, and runs the
//! loop on the calling thread until asked to stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::Receiver;
use log::{debug, info};

use crate::core::config::ScannerConfig;
use crate::device::{ContextScanner, ContextUri};
use crate::discovery::collector::Collector;
use crate::discovery::events::{DiscoveryEvent, ScanDiff, ScanReport};
use crate::discovery::scanner::Scanner;

/// Longest the loop blocks before re-checking the shutdown flag
const LOOP_SLICE: Duration = Duration::from_millis(100);

/// Periodic scanner wired to a collector
pub struct DiscoveryService<S> {
    scanner: Scanner<S>,
    collector: Collector,
    /// Most recent delivered scan
    last_report: Option<ScanReport>,
}

impl<S> DiscoveryService<S>
where
    S: ContextScanner + Send + Sync + 'static,
{
    /// Create a service around a scan backend
    pub fn new(backend: S, config: ScannerConfig) -> Self {
        Self::from_parts(Scanner::new(backend, config), Collector::new())
    }

    /// Assemble a service from an existing scanner and collector
    pub fn from_parts(scanner: Scanner<S>, collector: Collector) -> Self {
        Self {
            scanner,
            collector,
            last_report: None,
        }
    }

    pub fn scanner(&self) -> &Scanner<S> {
        &self.scanner
    }

    pub fn scanner_mut(&mut self) -> &mut Scanner<S> {
        &mut self.scanner
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn collector_mut(&mut self) -> &mut Collector {
        &mut self.collector
    }

    /// Register a callback for contexts that appear
    pub fn on_added<F>(&mut self, callback: F)
    where
        F: FnMut(&ContextUri) + Send + 'static,
    {
        self.collector.on_added(callback);
    }

    /// Register a callback for contexts that disappear
    pub fn on_removed<F>(&mut self, callback: F)
    where
        F: FnMut(&ContextUri) + Send + 'static,
    {
        self.collector.on_removed(callback);
    }

    /// Open a channel receiving every added/removed event
    pub fn subscribe(&mut self) -> Receiver<DiscoveryEvent> {
        self.collector.subscribe()
    }

    /// Most recent delivered scan, if any
    pub fn last_report(&self) -> Option<&ScanReport> {
        self.last_report.as_ref()
    }

    /// Contexts currently believed present
    pub fn known(&self) -> Vec<ContextUri> {
        self.collector.known().cloned().collect()
    }

    pub fn start(&mut self) {
        self.scanner.start();
    }

    pub fn stop(&mut self) {
        self.scanner.stop();
    }

    /// Forget known contexts without emitting anything
    pub fn clear_cache(&mut self) {
        self.collector.clear_cache();
    }

    /// User-initiated refresh: forget everything and scan right away
    ///
    /// Every context the next scan sees is reported as added again.
    pub fn force_rescan(&mut self) {
        info!("Forced rescan requested");
        self.collector.clear_cache();
        self.scanner.trigger_now();
    }

    /// Non-blocking step of the loop
    pub fn poll(&mut self) -> Option<ScanDiff> {
        let report = self.scanner.poll()?;
        Some(self.apply(report))
    }

    /// Blocking step of the loop, waits at most `max_wait`
    pub fn step(&mut self, max_wait: Duration) -> Option<ScanDiff> {
        let report = self.scanner.wait(max_wait)?;
        Some(self.apply(report))
    }

    /// Run until `shutdown` is set
    pub fn run(&mut self, shutdown: &AtomicBool) {
        self.run_cycles(None, shutdown);
    }

    /// Run until `shutdown` is set or `limit` scans have been applied
    ///
    /// Returns the number of scans applied.
    pub fn run_cycles(&mut self, limit: Option<u64>, shutdown: &AtomicBool) -> u64 {
        self.start();
        let mut applied = 0;

        while !shutdown.load(Ordering::SeqCst) {
            if limit.is_some_and(|limit| applied >= limit) {
                break;
            }
            if self.step(LOOP_SLICE).is_some() {
                applied += 1;
            }
        }

        debug!("Discovery loop exiting after {} scan(s)", applied);
        self.stop();
        applied
    }

    fn apply(&mut self, report: ScanReport) -> ScanDiff {
        let diff = self.collector.update(&report.uris);
        if !diff.is_empty() {
            debug!(
                "Scan #{}: +{} -{} ({} known)",
                report.cycle,
                diff.added.len(),
                diff.removed.len(),
                self.collector.len()
            );
        }
        self.last_report = Some(report);
        diff
    }
}

impl<S> std::fmt::Debug for DiscoveryService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryService")
            .field("scanner", &self.scanner)
            .field("collector", &self.collector)
            .finish()
    }
}
