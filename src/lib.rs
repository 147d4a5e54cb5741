//! IIO Context Discovery Library
//!
//! Periodically enumerates IIO hardware contexts reachable over USB, the
//! network or the local machine, and reports which contexts appeared and
//! which disappeared since the previous scan.
//!
//! # Architecture
//!
//! - [`core`] - Configuration and error types
//! - [`device`] - Context URIs, the `ContextScanner` trait and the libiio backend
//! - [`discovery`] - The periodic scanner, the collector that diffs scans,
//!   and the service that wires them together
//! - [`cli`] - Command-line interface (only used by the binary)
//! - [`testdb`] - Mock scanner and hot-plug scenarios for testing without hardware
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use iio_discovery::core::config::Config;
//! use iio_discovery::device::IioScanner;
//! use iio_discovery::discovery::DiscoveryService;
//! use std::sync::atomic::AtomicBool;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let mut service = DiscoveryService::new(IioScanner::new(), config.scanner);
//!
//!     service.on_added(|uri| println!("+ {}", uri));
//!     service.on_removed(|uri| println!("- {}", uri));
//!
//!     let shutdown = AtomicBool::new(false);
//!     service.run(&shutdown);
//!     Ok(())
//! }
//! ```
//!
//! # Testing Without Hardware
//!
//! ```rust,no_run
//! use iio_discovery::testdb::{run_scenario, ScenarioLibrary};
//!
//! for scenario in ScenarioLibrary::all() {
//!     assert!(run_scenario(&scenario).passed());
//! }
//! ```
//!
//! # Platform Support
//!
//! Real hardware access needs the system libiio and the `libiio` feature.
//! Without it every transport reports itself unavailable, which the
//! discovery loop treats as "no contexts found".

pub mod cli;
pub mod core;
pub mod device;
pub mod discovery;
pub mod testdb;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
