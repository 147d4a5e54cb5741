//! Predefined hot-plug scenarios
//!
//! Each scenario is a sequence of steps. A step changes what the mock
//! transports report, runs one full scan cycle through a `DiscoveryService`,
//! and states which URIs that cycle must report added and removed.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use super::mock_scanner::{MockFailure, MockScanner};
use crate::core::config::ScannerConfig;
use crate::discovery::{Collector, DiscoveryService, Scanner};

/// Longest a scenario waits for one mock scan
const CYCLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Change applied to the mock before a cycle
#[derive(Debug, Clone)]
pub enum StepAction {
    /// Plug a context in on a transport
    Plug {
        backend: String,
        uri: String,
        description: String,
    },
    /// Remove a context from every transport
    Unplug(String),
    /// Make a transport fail
    Fail(String, MockFailure),
    /// Clear a forced failure
    Restore(String),
    /// Drop the collector's known set before the cycle
    ClearCache,
}

/// One scan cycle and what it must report
#[derive(Debug, Clone, Default)]
pub struct ScenarioStep {
    pub actions: Vec<StepAction>,
    pub expect_added: Vec<String>,
    pub expect_removed: Vec<String>,
}

impl ScenarioStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plug(mut self, backend: &str, uri: &str, description: &str) -> Self {
        self.actions.push(StepAction::Plug {
            backend: backend.to_string(),
            uri: uri.to_string(),
            description: description.to_string(),
        });
        self
    }

    pub fn unplug(mut self, uri: &str) -> Self {
        self.actions.push(StepAction::Unplug(uri.to_string()));
        self
    }

    pub fn fail(mut self, backend: &str, failure: MockFailure) -> Self {
        self.actions.push(StepAction::Fail(backend.to_string(), failure));
        self
    }

    pub fn restore(mut self, backend: &str) -> Self {
        self.actions.push(StepAction::Restore(backend.to_string()));
        self
    }

    pub fn clear_cache(mut self) -> Self {
        self.actions.push(StepAction::ClearCache);
        self
    }

    pub fn expect_added(mut self, uris: &[&str]) -> Self {
        self.expect_added = uris.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn expect_removed(mut self, uris: &[&str]) -> Self {
        self.expect_removed = uris.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// A named hot-plug scenario
#[derive(Debug, Clone)]
pub struct HotplugScenario {
    /// Scenario name for identification
    pub name: String,
    /// Description of what this scenario tests
    pub description: String,
    /// Transports the scanner enumerates
    pub backends: Vec<String>,
    pub steps: Vec<ScenarioStep>,
    /// Tags for filtering scenarios
    pub tags: Vec<String>,
}

impl HotplugScenario {
    pub fn new(name: &str, description: &str, backends: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            backends: backends.iter().map(|s| s.to_string()).collect(),
            steps: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn step(mut self, step: ScenarioStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Add tags to the scenario
    pub fn with_tags(mut self, tags: Vec<&str>) -> Self {
        self.tags = tags.into_iter().map(String::from).collect();
        self
    }
}

/// What happened when a scenario ran
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub name: String,
    /// Cycles that ran
    pub cycles: usize,
    /// One line per step whose events did not match
    pub mismatches: Vec<String>,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Collection of all predefined scenarios
pub struct ScenarioLibrary;

impl ScenarioLibrary {
    /// Dedup, repeat, shrink, empty, clear and transport failure in a row
    pub fn basic_hotplug() -> HotplugScenario {
        HotplugScenario::new(
            "basic_hotplug",
            "Duplicates collapse, repeats are silent, removals are reported once",
            &["usb", "ip"],
        )
        .step(
            ScenarioStep::new()
                .plug("usb", "usb:1.2.3", "ADALM2000")
                .plug("usb", "usb:1.2.3", "ADALM2000")
                .plug("ip", "ip:192.168.1.1", "PlutoSDR")
                .expect_added(&["ip:192.168.1.1", "usb:1.2.3"]),
        )
        .step(ScenarioStep::new())
        .step(
            ScenarioStep::new()
                .unplug("ip:192.168.1.1")
                .expect_removed(&["ip:192.168.1.1"]),
        )
        .step(
            ScenarioStep::new()
                .unplug("usb:1.2.3")
                .expect_removed(&["usb:1.2.3"]),
        )
        .step(ScenarioStep::new().clear_cache())
        .step(
            ScenarioStep::new()
                .plug("usb", "usb:1.2.3", "ADALM2000")
                .expect_added(&["usb:1.2.3"]),
        )
        .step(
            ScenarioStep::new()
                .fail("usb", MockFailure::TransportUnavailable)
                .expect_removed(&["usb:1.2.3"]),
        )
        .with_tags(vec!["basic", "error"])
    }

    /// A failing scan drops everything, recovery brings it back as added
    pub fn flaky_transport() -> HotplugScenario {
        HotplugScenario::new(
            "flaky_transport",
            "A scan failure looks like an unplug until the transport recovers",
            &["usb"],
        )
        .step(
            ScenarioStep::new()
                .plug("usb", "usb:3.4.5", "ADALM2000")
                .plug("usb", "usb:3.4.6", "SWIOT")
                .expect_added(&["usb:3.4.5", "usb:3.4.6"]),
        )
        .step(
            ScenarioStep::new()
                .fail("usb", MockFailure::ScanFailed)
                .expect_removed(&["usb:3.4.5", "usb:3.4.6"]),
        )
        .step(ScenarioStep::new())
        .step(
            ScenarioStep::new()
                .restore("usb")
                .expect_added(&["usb:3.4.5", "usb:3.4.6"]),
        )
        .with_tags(vec!["error"])
    }

    /// One transport failing leaves the others' contexts alone
    pub fn partial_outage() -> HotplugScenario {
        HotplugScenario::new(
            "partial_outage",
            "Only contexts of the failing transport are reported removed",
            &["usb", "ip"],
        )
        .step(
            ScenarioStep::new()
                .plug("usb", "usb:1.0.1", "PQM")
                .plug("ip", "ip:10.0.0.7", "AD936x")
                .expect_added(&["ip:10.0.0.7", "usb:1.0.1"]),
        )
        .step(
            ScenarioStep::new()
                .fail("ip", MockFailure::TransportUnavailable)
                .expect_removed(&["ip:10.0.0.7"]),
        )
        .step(
            ScenarioStep::new()
                .restore("ip")
                .expect_added(&["ip:10.0.0.7"]),
        )
        .with_tags(vec!["error", "multi-transport"])
    }

    /// Swap one board for another between two cycles
    pub fn board_swap() -> HotplugScenario {
        HotplugScenario::new(
            "board_swap",
            "An unplug and a plug in the same cycle are both reported",
            &["usb"],
        )
        .step(
            ScenarioStep::new()
                .plug("usb", "usb:2.1.1", "ADALM2000")
                .expect_added(&["usb:2.1.1"]),
        )
        .step(
            ScenarioStep::new()
                .unplug("usb:2.1.1")
                .plug("usb", "usb:2.1.2", "PlutoSDR")
                .expect_added(&["usb:2.1.2"])
                .expect_removed(&["usb:2.1.1"]),
        )
        .with_tags(vec!["basic"])
    }

    /// Get all scenarios
    pub fn all() -> Vec<HotplugScenario> {
        vec![
            Self::basic_hotplug(),
            Self::flaky_transport(),
            Self::partial_outage(),
            Self::board_swap(),
        ]
    }

    /// Get scenario by name
    pub fn get(name: &str) -> Option<HotplugScenario> {
        Self::all().into_iter().find(|s| s.name == name)
    }

    /// Get scenarios by tag
    pub fn by_tag(tag: &str) -> Vec<HotplugScenario> {
        Self::all()
            .into_iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }
}

/// Run a scenario against a mock-backed discovery service
pub fn run_scenario(scenario: &HotplugScenario) -> ScenarioOutcome {
    let mock = Arc::new(MockScanner::new());
    let config = ScannerConfig::default()
        .with_backends(scenario.backends.iter().cloned())
        .scan_on_start(false);
    let mut service = DiscoveryService::from_parts(
        Scanner::with_shared(Arc::clone(&mock), config),
        Collector::new(),
    );
    service.start();

    let mut mismatches = Vec::new();
    let mut cycles = 0;

    for (index, step) in scenario.steps.iter().enumerate() {
        for action in &step.actions {
            match action {
                StepAction::Plug {
                    backend,
                    uri,
                    description,
                } => mock.plug(backend, uri, description),
                StepAction::Unplug(uri) => {
                    mock.unplug(uri);
                }
                StepAction::Fail(backend, failure) => mock.set_failure(backend, Some(*failure)),
                StepAction::Restore(backend) => mock.set_failure(backend, None),
                StepAction::ClearCache => service.clear_cache(),
            }
        }

        service.scanner_mut().trigger_now();
        let Some(diff) = service.step(CYCLE_TIMEOUT) else {
            mismatches.push(format!("step {}: scan did not complete", index + 1));
            break;
        };
        cycles += 1;

        let added: Vec<String> = diff.added.iter().map(|u| u.to_string()).collect();
        let removed: Vec<String> = diff.removed.iter().map(|u| u.to_string()).collect();
        debug!(
            "{} step {}: added {:?} removed {:?}",
            scenario.name,
            index + 1,
            added,
            removed
        );

        if sorted(&added) != sorted(&step.expect_added) {
            mismatches.push(format!(
                "step {}: added {:?}, expected {:?}",
                index + 1,
                added,
                step.expect_added
            ));
        }
        if sorted(&removed) != sorted(&step.expect_removed) {
            mismatches.push(format!(
                "step {}: removed {:?}, expected {:?}",
                index + 1,
                removed,
                step.expect_removed
            ));
        }
    }

    service.stop();
    ScenarioOutcome {
        name: scenario.name.clone(),
        cycles,
        mismatches,
    }
}

fn sorted(list: &[String]) -> Vec<String> {
    let mut list = list.to_vec();
    list.sort();
    list
}
