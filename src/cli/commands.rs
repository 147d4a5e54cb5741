//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::progress::{
    format_duration, print_error, print_header, print_info, print_success, print_warning,
    scan_spinner,
};
use crate::cli::{Args, Commands, TestCommands};
use crate::core::config::{get_config_path, init_config, Config};
use crate::device::{ContextInfo, ContextScanner, ContextUri, IioScanner};
use crate::discovery::{DiscoveryEvent, DiscoveryService, Scanner};
use crate::testdb::{run_scenario, HotplugScenario, MockScanner, ScenarioLibrary};
use anyhow::{bail, Result};
use chrono::Local;
use log::{info, warn};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Scan backend chosen at runtime
pub type BoxedScanner = Box<dyn ContextScanner + Send + Sync>;

/// Run the command selected on the command line
pub fn run_command(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    match &args.command {
        Some(Commands::Scan { json }) => scan_once(args, config, *json),
        Some(Commands::Watch { cycles, json }) => watch(args, config, *cycles, *json, &shutdown_flag),
        None => watch(args, config, None, false, &shutdown_flag),
        Some(Commands::Normalize { uri }) => normalize(uri),
        Some(Commands::Config { path, reset }) => handle_config_command(*path, *reset),
        Some(Commands::GenerateConfig { output }) => generate_config_file(output.clone()),
        Some(Commands::ShowConfig) => {
            show_config(config);
            Ok(())
        }
        Some(Commands::Test { test_command }) => handle_test_command(test_command),
    }
}

/// Pick the real libiio scanner or the simulated one
pub fn build_backend(simulate: bool) -> BoxedScanner {
    if simulate {
        info!("Using simulated IIO boards");
        return Box::new(simulated_scanner());
    }

    if !IioScanner::is_available() {
        warn!("Built without libiio support; every transport will report unavailable");
        warn!("Rebuild with `--features libiio` or pass --simulate");
    }
    Box::new(IioScanner::new())
}

/// A mock that starts with one board plugged in and lets a few more come
/// and go at random
fn simulated_scanner() -> MockScanner {
    let mock = MockScanner::new()
        .with_latency(Duration::from_millis(150))
        .with_random_failure_rate(5)
        .with_churn(
            "usb",
            ContextInfo::new("usb:1.5.5", "Analog Devices Inc. PlutoSDR (ADALM-PLUTO)"),
        )
        .with_churn(
            "ip",
            ContextInfo::new("ip:192.168.2.1", "Analog Devices Inc. PlutoSDR (network)"),
        )
        .with_churn("usb", ContextInfo::new("usb:3.12.5", "Analog Devices Inc. SWIOT1L"));
    mock.plug("usb", "usb:1.4.5", "Analog Devices Inc. M2k (ADALM2000)");
    mock
}

/// Scan once and list what was found
fn scan_once(args: &Args, config: &Config, json: bool) -> Result<()> {
    let scanner = Scanner::new(build_backend(args.simulate), config.scanner.clone());

    let spinner = scan_spinner(&format!(
        "Scanning {} ...",
        config.scanner.backends.join(", ")
    ));
    let report = scanner.scan_once();
    spinner.finish_and_clear();

    if json {
        let failures: Vec<String> = report.failures.iter().map(|e| e.to_string()).collect();
        let out = serde_json::json!({
            "started_at": report.started_at,
            "duration_ms": report.duration.as_millis() as u64,
            "contexts": report.contexts,
            "failures": failures,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_header("IIO Contexts");
    if report.contexts.is_empty() {
        print_info("No contexts found");
    }
    for ctx in &report.contexts {
        print_success(&ctx.to_string());
    }
    for failure in &report.failures {
        print_warning(&failure.to_string());
    }
    println!();
    print_info(&format!(
        "{} context(s) in {}",
        report.contexts.len(),
        format_duration(report.duration)
    ));

    Ok(())
}

/// Scan periodically and print every added/removed event
fn watch(
    args: &Args,
    config: &Config,
    cycles: Option<u64>,
    json: bool,
    shutdown_flag: &AtomicBool,
) -> Result<()> {
    let mut service = DiscoveryService::new(build_backend(args.simulate), config.scanner.clone());

    service.on_added(move |uri| print_event(&DiscoveryEvent::Added(uri.clone()), json));
    service.on_removed(move |uri| print_event(&DiscoveryEvent::Removed(uri.clone()), json));

    info!(
        "Scanning {} every {} ms (Ctrl+C to stop)",
        config.scanner.backends.join(", "),
        config.scanner.interval_ms
    );

    let applied = service.run_cycles(cycles, shutdown_flag);

    let known = service.known();
    info!(
        "Stopped after {} scan(s), {} context(s) present",
        applied,
        known.len()
    );
    if !json {
        for uri in &known {
            print_info(uri.as_str());
        }
    }

    Ok(())
}

fn print_event(event: &DiscoveryEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize event: {}", e),
        }
        return;
    }

    let (sign, uri) = match event {
        DiscoveryEvent::Added(uri) => ('+', uri),
        DiscoveryEvent::Removed(uri) => ('-', uri),
    };
    println!("[{}] {} {}", Local::now().format("%H:%M:%S"), sign, uri);
}

/// Print the normalized form of a URI
fn normalize(input: &str) -> Result<()> {
    let uri = ContextUri::normalize(input)?;
    println!("{}", uri);
    Ok(())
}

/// Handle the config command (show path or reset)
pub fn handle_config_command(show_path: bool, reset: bool) -> Result<()> {
    if reset {
        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                fs::remove_file(&config_path)?;
                info!("Removed existing config file");
            }
        }
        let path = init_config()?;
        info!("Created fresh config file at: {}", path.display());
        return Ok(());
    }

    let path = if show_path {
        Config::get_active_config_path()
    } else {
        init_config()?
    };
    println!("{}", path.display());
    if path.exists() {
        info!("Config file exists at: {}", path.display());
    } else {
        info!("Config file would be created at: {}", path.display());
    }

    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            fs::write(&path, Config::generate_default_config())?;
            path
        }
        None => init_config()?,
    };

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to change the scan interval, transports and URI filters.");

    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    info!("");
    info!("Current Configuration:");
    info!("----------------------");
    info!("[scanner]");
    info!("  interval_ms = {}", config.scanner.interval_ms);
    info!("  backends = {:?}", config.scanner.backends);
    info!("  uri_filters = {:?}", config.scanner.uri_filters);
    info!("  scan_on_start = {}", config.scanner.scan_on_start);
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
}

/// Handle scenario commands
pub fn handle_test_command(test_command: &TestCommands) -> Result<()> {
    match test_command {
        TestCommands::List { tag } => {
            list_scenarios(tag.as_deref());
            Ok(())
        }
        TestCommands::Run { scenarios, tag } => run_scenarios(scenarios, tag.as_deref()),
    }
}

fn select_scenarios(names: &[String], tag: Option<&str>) -> Result<Vec<HotplugScenario>> {
    let mut selected = match tag {
        Some(tag) => ScenarioLibrary::by_tag(tag),
        None if names.is_empty() => ScenarioLibrary::all(),
        None => Vec::new(),
    };

    for name in names {
        match ScenarioLibrary::get(name) {
            Some(scenario) => {
                if !selected.iter().any(|s| s.name == scenario.name) {
                    selected.push(scenario);
                }
            }
            None => bail!("Unknown scenario: {}", name),
        }
    }

    Ok(selected)
}

fn list_scenarios(tag: Option<&str>) {
    let scenarios = match tag {
        Some(tag) => ScenarioLibrary::by_tag(tag),
        None => ScenarioLibrary::all(),
    };

    print_header("Hot-plug Scenarios");
    for scenario in scenarios {
        println!("  {} [{}]", scenario.name, scenario.tags.join(", "));
        println!("      {}", scenario.description);
        println!(
            "      {} step(s) over {}",
            scenario.steps.len(),
            scenario.backends.join(", ")
        );
    }
}

fn run_scenarios(names: &[String], tag: Option<&str>) -> Result<()> {
    let scenarios = select_scenarios(names, tag)?;
    if scenarios.is_empty() {
        print_warning("No scenarios selected");
        return Ok(());
    }

    print_header("Running Scenarios");
    let mut failed = 0;
    for scenario in &scenarios {
        let outcome = run_scenario(scenario);
        if outcome.passed() {
            print_success(&format!("{} ({} cycles)", outcome.name, outcome.cycles));
        } else {
            failed += 1;
            print_error(&outcome.name);
            for mismatch in &outcome.mismatches {
                println!("      {}", mismatch);
            }
        }
    }

    println!();
    print_info(&format!(
        "{}/{} scenario(s) passed",
        scenarios.len() - failed,
        scenarios.len()
    ));

    if failed > 0 {
        bail!("{} scenario(s) failed", failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_scanner_starts_with_a_board() {
        let mock = simulated_scanner();
        assert_eq!(mock.plugged("usb"), vec!["usb:1.4.5"]);
    }

    #[test]
    fn test_select_scenarios() {
        assert_eq!(
            select_scenarios(&[], None).unwrap().len(),
            ScenarioLibrary::all().len()
        );

        let picked = select_scenarios(&["board_swap".to_string()], None).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "board_swap");

        let tagged = select_scenarios(&["flaky_transport".to_string()], Some("error")).unwrap();
        assert_eq!(tagged.len(), ScenarioLibrary::by_tag("error").len());

        assert!(select_scenarios(&["nope".to_string()], None).is_err());
    }

    #[test]
    fn test_run_scenarios_passes() {
        assert!(run_scenarios(&["board_swap".to_string()], None).is_ok());
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(normalize("  ").is_err());
        assert!(normalize("10.0.0.1").is_ok());
    }
}
