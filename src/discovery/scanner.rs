//! Periodic context scanner
//!
//! Runs the blocking enumeration call off the owning thread at a fixed
//! interval and hands the results back on the owning thread.
//!
//! The scanner is driven by whoever owns it (a UI loop, [`DiscoveryService`],
//! a test): `poll`/`wait` fire the timer when it is due and deliver finished
//! scans. The timer is disarmed before a scan is dispatched and rearmed only
//! when that scan's result is delivered, so a scanner never has more than
//! one enumeration in flight.
//!
//! [`DiscoveryService`]: crate::discovery::DiscoveryService

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use log::{debug, error, info, trace, warn};

use crate::core::config::ScannerConfig;
use crate::core::error::DiscoveryError;
use crate::device::{ContextScanner, ContextUri};
use crate::discovery::events::ScanReport;

/// Callback invoked with every delivered scan
pub type ReportCallback = Box<dyn FnMut(&ScanReport) + Send>;

// =============================================================================
// Scan Timer
// =============================================================================

/// Single-shot deadline that the scanner rearms after each delivery
#[derive(Debug, Clone)]
pub struct ScanTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl ScanTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Fire one interval after `now`
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    /// Fire at an explicit instant
    pub fn arm_at(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Time left before the timer fires, `None` when disarmed
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

// =============================================================================
// Enumeration
// =============================================================================

/// Run one blocking enumeration over every configured transport
///
/// A transport that cannot be opened or scanned contributes no contexts;
/// its error is logged and recorded in `failures`, never returned.
pub fn scan_contexts<S>(scanner: &S, config: &ScannerConfig, cycle: u64) -> ScanReport
where
    S: ContextScanner + ?Sized,
{
    let started_at = Utc::now();
    let start = Instant::now();

    let mut contexts = Vec::new();
    let mut failures = Vec::new();

    for backend in &config.backends {
        match scanner.scan(backend) {
            Ok(found) => {
                trace!("{}: {} context(s) on '{}'", scanner.name(), found.len(), backend);
                contexts.extend(found);
            }
            Err(e) => {
                warn!("{}", e);
                failures.push(e);
            }
        }
    }

    let mut uris = Vec::with_capacity(contexts.len());
    contexts.retain_mut(|ctx| match ContextUri::new(&ctx.uri) {
        Ok(uri) if config.accepts(uri.as_str()) => {
            ctx.uri = uri.to_string();
            uris.push(uri);
            true
        }
        Ok(uri) => {
            trace!("Filtered out {}", uri);
            false
        }
        Err(e) => {
            debug!("Dropping scan entry '{}': {}", ctx.description, e);
            false
        }
    });

    ScanReport {
        cycle,
        contexts,
        uris,
        failures,
        started_at,
        duration: start.elapsed(),
    }
}

// =============================================================================
// Scanner
// =============================================================================

/// Periodic, non-overlapping scanner
pub struct Scanner<S> {
    /// Backend shared with the worker threads
    backend: Arc<S>,
    config: ScannerConfig,
    timer: ScanTimer,
    /// Result channel of the scan in flight, if any
    pending: Option<Receiver<ScanReport>>,
    /// Cleared by `stop`; a delivery only rearms a running scanner
    running: bool,
    /// Number of scans dispatched so far
    cycle: u64,
    subscribers: Vec<ReportCallback>,
}

impl<S> Scanner<S>
where
    S: ContextScanner + Send + Sync + 'static,
{
    /// Create a scanner that owns its backend
    pub fn new(backend: S, config: ScannerConfig) -> Self {
        Self::with_shared(Arc::new(backend), config)
    }

    /// Create a scanner over a backend the caller keeps a handle to
    pub fn with_shared(backend: Arc<S>, config: ScannerConfig) -> Self {
        let timer = ScanTimer::new(config.interval());
        Self {
            backend,
            config,
            timer,
            pending: None,
            running: false,
            cycle: 0,
            subscribers: Vec::new(),
        }
    }

    /// Register a callback for every delivered scan
    pub fn on_results<F>(&mut self, callback: F)
    where
        F: FnMut(&ScanReport) + Send + 'static,
    {
        self.subscribers.push(Box::new(callback));
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<S> {
        &self.backend
    }

    /// Arm the periodic timer
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Arm the periodic timer relative to `now`
    ///
    /// Does nothing if the scanner is already armed or a scan is in flight.
    pub fn start_at(&mut self, now: Instant) {
        if self.running && (self.timer.is_armed() || self.pending.is_some()) {
            trace!("Scanner already running");
            return;
        }

        self.running = true;
        if self.config.scan_on_start {
            self.timer.arm_at(now);
        } else {
            self.timer.arm(now);
        }

        info!(
            "Context scanner started ({} every {} ms)",
            self.config.backends.join(", "),
            self.config.interval_ms
        );
    }

    /// Disarm the timer. A scan already in flight is still delivered but
    /// does not rearm the timer.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.timer.disarm();
        info!("Context scanner stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// A scan has been dispatched and not delivered yet
    pub fn is_scanning(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of scans dispatched so far
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    /// When the timer fires next, `None` while disarmed
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Timer expiry: disarm and dispatch one enumeration on a worker
    pub fn on_timer(&mut self) {
        self.timer.disarm();

        if self.pending.is_some() {
            debug!("Scan #{} still in flight, skipping tick", self.cycle);
            return;
        }

        self.cycle += 1;
        let cycle = self.cycle;
        let backend = Arc::clone(&self.backend);
        let config = self.config.clone();
        let (tx, rx) = bounded(1);
        let fallback = tx.clone();

        let spawned = thread::Builder::new()
            .name("iio-scan".to_string())
            .spawn(move || {
                let report = scan_contexts(backend.as_ref(), &config, cycle);
                if tx.send(report).is_err() {
                    trace!("Scan #{} finished after its scanner went away", cycle);
                }
            });

        match spawned {
            Ok(_) => {
                // Only the worker may hold a sender, so a dead worker shows up
                // as a disconnected channel
                drop(fallback);
                debug!("Scan #{} dispatched", cycle);
            }
            Err(e) => {
                error!("Failed to spawn scan worker: {}", e);
                let _ = fallback.send(ScanReport::failed(
                    cycle,
                    DiscoveryError::WorkerUnavailable(e.to_string()),
                ));
            }
        }

        self.pending = Some(rx);
    }

    /// Dispatch a scan right away unless one is already in flight
    pub fn trigger_now(&mut self) {
        if self.pending.is_some() {
            debug!("Scan #{} already in flight", self.cycle);
            return;
        }
        self.on_timer();
    }

    /// Non-blocking step: deliver a finished scan, or fire a due timer
    pub fn poll(&mut self) -> Option<ScanReport> {
        self.poll_at(Instant::now())
    }

    /// Same as [`poll`](Self::poll) with an explicit clock
    pub fn poll_at(&mut self, now: Instant) -> Option<ScanReport> {
        if let Some(report) = self.try_take_result() {
            return Some(self.deliver(report, now));
        }

        if self.timer.is_due(now) {
            self.on_timer();
        }

        None
    }

    /// Blocking step: wait up to `max_wait` for the in-flight scan, or sleep
    /// until the timer is due and dispatch
    pub fn wait(&mut self, max_wait: Duration) -> Option<ScanReport> {
        if let Some(rx) = &self.pending {
            let outcome = match rx.recv_timeout(max_wait) {
                Ok(report) => Some(report),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => Some(self.lost_worker_report()),
            };
            return outcome.map(|report| self.deliver(report, Instant::now()));
        }

        let sleep_for = self
            .timer
            .remaining(Instant::now())
            .map_or(max_wait, |remaining| remaining.min(max_wait));
        if !sleep_for.is_zero() {
            thread::sleep(sleep_for);
        }

        self.poll_at(Instant::now())
    }

    /// Blocking enumeration on the calling thread, URIs only
    pub fn enumerate(&self) -> Vec<ContextUri> {
        self.scan_once().uris
    }

    /// Blocking enumeration on the calling thread. Does not touch the timer.
    pub fn scan_once(&self) -> ScanReport {
        scan_contexts(self.backend.as_ref(), &self.config, 0)
    }

    fn try_take_result(&self) -> Option<ScanReport> {
        let rx = self.pending.as_ref()?;
        match rx.try_recv() {
            Ok(report) => Some(report),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.lost_worker_report()),
        }
    }

    fn lost_worker_report(&self) -> ScanReport {
        error!("Scan worker #{} exited without a result", self.cycle);
        ScanReport::failed(
            self.cycle,
            DiscoveryError::WorkerUnavailable("scan worker exited without a result".to_string()),
        )
    }

    /// Hand a finished scan to subscribers and rearm the timer
    fn deliver(&mut self, report: ScanReport, now: Instant) -> ScanReport {
        self.pending = None;

        debug!(
            "Scan #{} delivered: {} context(s), {} failed transport(s), took {:?}",
            report.cycle,
            report.uris.len(),
            report.failures.len(),
            report.duration
        );

        for callback in self.subscribers.iter_mut() {
            callback(&report);
        }

        if self.running {
            self.timer.arm(now);
        }

        report
    }
}

impl<S> std::fmt::Debug for Scanner<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("config", &self.config)
            .field("timer", &self.timer)
            .field("scanning", &self.pending.is_some())
            .field("running", &self.running)
            .field("cycle", &self.cycle)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ContextInfo;
    use crate::testdb::{MockFailure, MockScanner};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(5);

    fn config() -> ScannerConfig {
        ScannerConfig::default()
            .with_interval(1000)
            .scan_on_start(false)
    }

    fn shared_mock() -> Arc<MockScanner> {
        let mock = MockScanner::new();
        mock.plug("usb", "usb:1.2.3", "ADALM2000");
        mock.plug("usb", "usb:1.2.4", "PlutoSDR");
        Arc::new(mock)
    }

    fn uri_strings(report: &ScanReport) -> Vec<String> {
        report.uris.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_timer_arm_and_due() {
        let now = Instant::now();
        let mut timer = ScanTimer::new(Duration::from_millis(500));
        assert!(!timer.is_armed());
        assert!(!timer.is_due(now));
        assert_eq!(timer.remaining(now), None);

        timer.arm(now);
        assert!(timer.is_armed());
        assert!(!timer.is_due(now));
        assert_eq!(timer.remaining(now), Some(Duration::from_millis(500)));
        assert!(timer.is_due(now + Duration::from_millis(500)));
        assert_eq!(
            timer.remaining(now + Duration::from_secs(2)),
            Some(Duration::ZERO)
        );

        timer.disarm();
        assert!(!timer.is_due(now + Duration::from_secs(2)));
    }

    #[test]
    fn test_start_arms_one_interval_out() {
        let mut scanner = Scanner::with_shared(shared_mock(), config());
        let now = Instant::now();
        scanner.start_at(now);

        assert!(scanner.is_running());
        assert!(scanner.is_armed());
        assert_eq!(scanner.next_deadline(), Some(now + Duration::from_secs(1)));

        assert!(scanner.poll_at(now).is_none());
        assert!(!scanner.is_scanning());
    }

    #[test]
    fn test_scan_on_start_fires_immediately() {
        let mut scanner = Scanner::with_shared(shared_mock(), config().scan_on_start(true));
        let now = Instant::now();
        scanner.start_at(now);

        assert!(scanner.poll_at(now).is_none());
        assert!(scanner.is_scanning());
        assert!(!scanner.is_armed());
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut scanner = Scanner::with_shared(shared_mock(), config());
        let now = Instant::now();
        scanner.start_at(now);
        scanner.start_at(now + Duration::from_millis(700));

        assert_eq!(scanner.next_deadline(), Some(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_tick_dispatches_and_delivery_rearms() {
        let mock = shared_mock();
        let mut scanner = Scanner::with_shared(Arc::clone(&mock), config());
        let now = Instant::now();
        scanner.start_at(now);

        assert!(scanner.poll_at(now + Duration::from_secs(1)).is_none());
        assert!(scanner.is_scanning());
        assert!(!scanner.is_armed());
        assert_eq!(scanner.cycles(), 1);

        let report = scanner.wait(WAIT).expect("scan result");
        assert_eq!(report.cycle, 1);
        assert_eq!(uri_strings(&report), vec!["usb:1.2.3", "usb:1.2.4"]);
        assert_eq!(report.contexts[1].description, "PlutoSDR");
        assert!(!report.is_degraded());

        assert!(!scanner.is_scanning());
        assert!(scanner.is_armed());
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn test_subscribers_receive_reports() {
        let mut scanner = Scanner::with_shared(shared_mock(), config());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        scanner.on_results(move |report| {
            counter.fetch_add(report.uris.len(), Ordering::SeqCst);
        });

        scanner.start();
        scanner.trigger_now();
        scanner.wait(WAIT).expect("scan result");

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_at_most_one_scan_in_flight() {
        let mock = Arc::new(MockScanner::new().with_latency(Duration::from_millis(100)));
        mock.plug("usb", "usb:1.2.3", "ADALM2000");
        let mut scanner = Scanner::with_shared(Arc::clone(&mock), config());
        scanner.start();

        scanner.trigger_now();
        scanner.trigger_now();
        scanner.on_timer();
        let far_future = Instant::now() + Duration::from_secs(60);
        assert!(scanner.poll_at(far_future).is_none());

        let report = scanner.wait(WAIT).expect("scan result");
        assert_eq!(report.cycle, 1);
        assert_eq!(scanner.cycles(), 1);
        assert_eq!(mock.calls(), 1);
        assert_eq!(mock.max_concurrent_scans(), 1);
    }

    #[test]
    fn test_transport_failure_yields_empty_report_and_rearms() {
        let mock = shared_mock();
        mock.set_failure("usb", Some(MockFailure::TransportUnavailable));
        let mut scanner = Scanner::with_shared(Arc::clone(&mock), config());
        scanner.start();
        scanner.trigger_now();

        let report = scanner.wait(WAIT).expect("scan result");
        assert!(report.is_empty());
        assert!(report.is_degraded());
        assert!(matches!(
            report.failures[0],
            DiscoveryError::TransportUnavailable { .. }
        ));
        assert!(scanner.is_armed());
    }

    #[test]
    fn test_scan_failure_on_one_transport_keeps_the_others() {
        let mock = shared_mock();
        mock.plug("ip", "ip:192.168.2.1", "PlutoSDR (network)");
        mock.set_failure("usb", Some(MockFailure::ScanFailed));

        let scanner = Scanner::with_shared(mock, config().with_backends(["usb", "ip"]));
        let report = scanner.scan_once();

        assert_eq!(uri_strings(&report), vec!["ip:192.168.2.1"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].backend(), Some("usb"));
    }

    #[test]
    fn test_uri_filter_drops_other_transports() {
        let mock = shared_mock();
        mock.plug("usb", "serial:/dev/ttyUSB0", "bridge");

        let scanner = Scanner::with_shared(mock, config().with_uri_filters(["usb:"]));
        let uris: Vec<String> = scanner.enumerate().iter().map(|u| u.to_string()).collect();
        assert_eq!(uris, vec!["usb:1.2.3", "usb:1.2.4"]);
    }

    #[test]
    fn test_uri_filter_matches_trimmed_uri() {
        let mock = Arc::new(MockScanner::new());
        mock.plug("usb", " usb:1.2.3", "ADALM2000");

        let report = Scanner::with_shared(mock, config().with_uri_filters(["usb:"])).scan_once();
        assert_eq!(uri_strings(&report), vec!["usb:1.2.3"]);
        assert_eq!(report.contexts[0].uri, "usb:1.2.3");
    }

    struct PanickingScanner;

    impl ContextScanner for PanickingScanner {
        fn scan(&self, _backend: &str) -> crate::core::error::Result<Vec<ContextInfo>> {
            panic!("backend crashed");
        }
    }

    #[test]
    fn test_dead_worker_yields_empty_report_and_rearms() {
        let mut scanner = Scanner::new(PanickingScanner, config());
        scanner.start();
        scanner.trigger_now();

        let report = scanner.wait(WAIT).expect("scan result");
        assert!(report.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0],
            DiscoveryError::WorkerUnavailable(_)
        ));
        assert!(!scanner.is_scanning());
        assert!(scanner.is_armed());

        let due = scanner.next_deadline().expect("armed");
        assert!(scanner.poll_at(due).is_none());
        assert!(scanner.is_scanning());
        assert_eq!(scanner.cycles(), 2);
        let report = scanner.wait(WAIT).expect("scan result");
        assert_eq!(report.cycle, 2);
        assert!(report.is_degraded());
    }

    #[test]
    fn test_blank_uris_are_dropped() {
        let mock = shared_mock();
        mock.plug("usb", "   ", "broken descriptor");

        let report = Scanner::with_shared(mock, config()).scan_once();
        assert_eq!(report.uris.len(), 2);
        assert_eq!(report.contexts.len(), 2);
    }

    #[test]
    fn test_stop_prevents_rearm() {
        let mut scanner = Scanner::with_shared(shared_mock(), config());
        scanner.start();
        scanner.trigger_now();
        scanner.stop();

        let report = scanner.wait(WAIT);
        assert!(report.is_some());
        assert!(!scanner.is_armed());
        assert!(!scanner.is_running());
    }

    #[test]
    fn test_wait_without_timer_times_out() {
        let mut scanner = Scanner::with_shared(shared_mock(), config());
        assert!(scanner.wait(Duration::from_millis(10)).is_none());
        assert_eq!(scanner.cycles(), 0);
    }
}
