//! Discovery Events Module
//!
//! Event and report types passed from the discovery loop to its subscribers.
//! All of them are plain data so they can travel through channels.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::error::DiscoveryError;
use crate::device::{ContextInfo, ContextUri};

// =============================================================================
// Context Events
// =============================================================================

/// A change in the set of reachable contexts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "event", content = "uri", rename_all = "lowercase")]
pub enum DiscoveryEvent {
    /// A context showed up that was not known before
    Added(ContextUri),
    /// A previously known context is gone
    Removed(ContextUri),
}

impl DiscoveryEvent {
    /// URI the event is about
    pub fn uri(&self) -> &ContextUri {
        match self {
            DiscoveryEvent::Added(uri) | DiscoveryEvent::Removed(uri) => uri,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, DiscoveryEvent::Added(_))
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, DiscoveryEvent::Removed(_))
    }

    /// Get a human-readable description
    pub fn description(&self) -> String {
        match self {
            DiscoveryEvent::Added(uri) => format!("Context discovered: {}", uri),
            DiscoveryEvent::Removed(uri) => format!("Context lost: {}", uri),
        }
    }
}

// =============================================================================
// Scan Diff
// =============================================================================

/// Result of applying one scan to the known set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanDiff {
    /// URIs reported as added, in set order
    pub added: Vec<ContextUri>,
    /// URIs reported as removed, in set order
    pub removed: Vec<ContextUri>,
}

impl ScanDiff {
    /// True when the scan changed nothing
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Number of events the diff produced
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    /// The diff as a flat event list, additions first
    pub fn events(&self) -> Vec<DiscoveryEvent> {
        self.added
            .iter()
            .cloned()
            .map(DiscoveryEvent::Added)
            .chain(self.removed.iter().cloned().map(DiscoveryEvent::Removed))
            .collect()
    }
}

// =============================================================================
// Scan Report
// =============================================================================

/// Everything one enumeration pass produced
///
/// `uris` is what the collector consumes. `failures` lists transports that
/// could not be scanned this cycle; they contribute nothing to `uris`, so a
/// failed transport looks exactly like an empty one to the collector.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Sequence number of the scan, starting at 1
    pub cycle: u64,
    /// Contexts that passed the URI filter, in scan order
    pub contexts: Vec<ContextInfo>,
    /// URIs of `contexts`, in scan order (may contain duplicates)
    pub uris: Vec<ContextUri>,
    /// Transports that failed this cycle
    pub failures: Vec<DiscoveryError>,
    /// Wall-clock time the scan started
    pub started_at: DateTime<Utc>,
    /// How long the blocking enumeration took
    pub duration: Duration,
}

impl ScanReport {
    /// An empty report for a cycle that never reached the backend
    pub fn failed(cycle: u64, error: DiscoveryError) -> Self {
        Self {
            cycle,
            contexts: Vec::new(),
            uris: Vec::new(),
            failures: vec![error],
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    /// No context was found this cycle
    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }

    /// At least one transport failed this cycle
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}
