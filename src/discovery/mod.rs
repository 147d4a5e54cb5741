//! Periodic context discovery
//!
//! [`Scanner`] enumerates contexts on a timer, one scan at a time, and
//! [`Collector`] turns each result into added/removed events.
//! [`DiscoveryService`] wires the two together.

pub mod collector;
pub mod events;
pub mod scanner;
pub mod service;

pub use collector::{Collector, UriCallback};
pub use events::{DiscoveryEvent, ScanDiff, ScanReport};
pub use scanner::{scan_contexts, ScanTimer, Scanner};
pub use service::DiscoveryService;
