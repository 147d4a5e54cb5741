//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Watch for IIO contexts appearing and disappearing on USB and the network
#[derive(Parser, Debug)]
#[command(name = "iio-discovery")]
#[command(author = "Vihaan Reddy M")]
#[command(version)]
#[command(about = "Periodically scan for IIO contexts and report when they are plugged in or removed", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Milliseconds between scans (overrides config)
    #[arg(short, long, global = true, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Transport to scan: usb, ip, local (can be specified multiple times, overrides config)
    #[arg(short, long = "backend", value_name = "BACKEND", global = true)]
    pub backends: Vec<String>,

    /// Only report URIs starting with this prefix (can be specified multiple times)
    #[arg(long = "filter", value_name = "PREFIX", global = true)]
    pub uri_filters: Vec<String>,

    /// Scan a simulated set of boards instead of real hardware
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan once and list the contexts found
    Scan {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan periodically and report added/removed contexts (default)
    Watch {
        /// Stop after this many scans
        #[arg(short = 'n', long, value_name = "COUNT")]
        cycles: Option<u64>,

        /// Print one JSON object per event
        #[arg(long)]
        json: bool,
    },

    /// Normalize a context URI (a bare IPv4 address becomes "ip:<addr>")
    Normalize {
        /// URI or address to normalize
        uri: String,
    },

    /// Manage the configuration file
    ///
    /// The config file is stored at:
    /// - Windows: %APPDATA%\iio_discovery\config.toml
    /// - Linux: ~/.config/iio_discovery/config.toml
    ///
    /// If no config file exists, a default one will be created.
    Config {
        /// Show the config file path
        #[arg(long)]
        path: bool,

        /// Reset config to defaults (creates a fresh config file)
        #[arg(long)]
        reset: bool,
    },

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Output path for the config file (defaults to standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration
    ShowConfig,

    /// Run hot-plug scenarios against the simulated scanner
    Test {
        #[command(subcommand)]
        test_command: TestCommands,
    },
}

/// Scenario commands
#[derive(Subcommand, Debug)]
pub enum TestCommands {
    /// Run scenarios (all of them when no name or tag is given)
    Run {
        /// Scenario names to run
        scenarios: Vec<String>,

        /// Only run scenarios with this tag
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// List available scenarios
    List {
        /// Only list scenarios with this tag
        #[arg(short, long)]
        tag: Option<String>,
    },
}
