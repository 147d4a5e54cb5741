//! Test database module
//!
//! Lets the whole discovery pipeline run without any IIO hardware attached.
//!
//! - **Mock scanner**: an in-memory `ContextScanner` whose plugged contexts,
//!   failures, latency and random churn are set from the outside
//! - **Scenarios**: scripted hot-plug sequences with the events each scan
//!   cycle must produce
//!
//! ```rust,no_run
//! use iio_discovery::testdb::{run_scenario, ScenarioLibrary};
//!
//! for scenario in ScenarioLibrary::all() {
//!     let outcome = run_scenario(&scenario);
//!     println!("{}: {}", outcome.name, outcome.passed());
//! }
//! ```

pub mod mock_scanner;
pub mod scenarios;

pub use mock_scanner::{MockFailure, MockScanConfig, MockScanner};
pub use scenarios::{
    run_scenario, HotplugScenario, ScenarioLibrary, ScenarioOutcome, ScenarioStep, StepAction,
};
