use clap::Parser;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::error;

use catfinder::cli::Cli;
use catfinder::config::AppConfig;
use catfinder::fetcher::HttpFetcher;
use catfinder::logger::{init_logging, VerbosityLevel};
use catfinder::pipeline::{run_pipeline, Interrupted, RunInput};
use catfinder::seed::load_seed_file;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Handle --init flag first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run catfinder again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut config = match AppConfig::resolve(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            eprintln!("   Run with --init to create a default configuration file.");
            std::process::exit(1);
        }
    };
    if let Err(e) = cli.apply_overrides(&mut config) {
        eprintln!("❌ Configuration error: {}", e);
        std::process::exit(1);
    }

    let verbosity = VerbosityLevel::from_flags(cli.quiet, cli.verbose);
    if let Err(e) = init_logging(
        Path::new(&config.output.log_file),
        &config.output.log_level,
        verbosity,
        !cli.no_console_log,
    ) {
        eprintln!("❌ Failed to initialize logging: {:#}", e);
        std::process::exit(1);
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
        eprintln!("\n⚠️  Interrupt received. Stopping after the current request...");
    })
    .unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to set Ctrl-C handler: {}. Interrupt signals may not be handled gracefully.", e);
    });

    let seeds = match cli.seed_file.as_deref().map(load_seed_file).transpose() {
        Ok(seeds) => seeds.unwrap_or_default(),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let fetcher = match HttpFetcher::new(&config.http) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("❌ Failed to create HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let show_progress = verbosity.shows_progress() && io::stderr().is_terminal();
    let input = RunInput {
        seeds,
        collect: !cli.no_collect,
    };

    match run_pipeline(&fetcher, &config, input, &cancel, show_progress).await {
        Ok(summary) => summary.print_final_summary(),
        Err(e) if e.downcast_ref::<Interrupted>().is_some() => {
            error!("Run interrupted; no output written");
            eprintln!("⚠️  Interrupted. No output files were written.");
            std::process::exit(130); // 130 = 128 + SIGINT(2), standard exit code for Ctrl-C
        }
        Err(e) => {
            error!("Pipeline failed: {:#}", e);
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }
}
