use clap::Parser;
use std::path::PathBuf;

use crate::config::{AppConfig, ConfigError};

#[derive(Parser, Debug)]
#[command(name = "catfinder")]
#[command(about = "Collects Russian companies above a revenue threshold and keeps those whose websites show CAT tool usage")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to ./config/catfinder.toml, then built-in settings)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Create default configuration file at ./config/catfinder.toml and exit
    #[arg(long)]
    pub init: bool,

    /// CSV or JSON file of known companies to analyse alongside collected ones
    #[arg(long, value_name = "PATH")]
    pub seed_file: Option<PathBuf>,

    /// Skip the directory and registry collectors (seed-only run)
    #[arg(long, requires = "seed_file")]
    pub no_collect: bool,

    /// Output directory for companies.csv, companies.xlsx and report.txt
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Minimum annual revenue in roubles (overrides config)
    #[arg(long, value_name = "RUB")]
    pub min_revenue: Option<u64>,

    /// Total HTTP attempts per URL (overrides config)
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Log file path (overrides config)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Write logs only to the log file
    #[arg(long)]
    pub no_console_log: bool,

    /// Suppress console output except the final summary
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose logging (use -v for INFO, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration and re-validate
    pub fn apply_overrides(&self, config: &mut AppConfig) -> Result<(), ConfigError> {
        if let Some(min_revenue) = self.min_revenue {
            config.search.min_revenue = min_revenue;
        }
        if let Some(max_retries) = self.max_retries {
            config.http.max_retries = max_retries;
        }
        if let Some(dir) = &self.output_dir {
            config.output.directory = dir.to_string_lossy().into_owned();
        }
        if let Some(log_file) = &self.log_file {
            config.output.log_file = log_file.to_string_lossy().into_owned();
        }
        config.validate()
    }
}
