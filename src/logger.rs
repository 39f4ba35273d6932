use anyhow::Context;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,    // Nothing on the console except the final summary
    Summary = 1,   // Warnings and errors (default)
    Detailed = 2,  // Per-stage and per-company progress
    Debug = 3,     // Everything including HTTP attempts
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            VerbosityLevel::Silent
        } else {
            Self::from_verbose_count(verbose)
        }
    }

    fn console_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Silent => "off",
            VerbosityLevel::Summary => "warn",
            VerbosityLevel::Detailed => "info",
            VerbosityLevel::Debug => "debug",
        }
    }

    pub fn shows_progress(&self) -> bool {
        *self > VerbosityLevel::Silent
    }
}

/// Install the global subscriber: an append-only file layer at `file_level`
/// plus, unless disabled, a stderr layer following the verbosity.
/// `CATFINDER_LOG` overrides the console filter.
pub fn init_logging(
    log_file: &Path,
    file_level: &str,
    verbosity: VerbosityLevel,
    console: bool,
) -> anyhow::Result<()> {
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("opening log file {}", log_file.display()))?;

    let file_filter: LevelFilter = file_level
        .parse()
        .with_context(|| format!("invalid log level '{}'", file_level))?;

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_filter(file_filter);

    let console_layer = (console && verbosity > VerbosityLevel::Silent).then(|| {
        let filter = EnvFilter::try_from_env("CATFINDER_LOG")
            .unwrap_or_else(|_| EnvFilter::new(verbosity.console_directive()));
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter)
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

/// Progress bar for one pipeline stage
pub struct StageProgress {
    bar: ProgressBar,
}

impl StageProgress {
    pub fn new(total_steps: u64, stage: &str, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::with_draw_target(Some(total_steps), ProgressDrawTarget::stderr())
        } else {
            ProgressBar::hidden()
        };

        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        bar.set_message(stage.to_string());

        Self { bar }
    }

    pub fn hidden() -> Self {
        Self::new(0, "", false)
    }

    pub fn inc_length(&self, steps: u64) {
        self.bar.inc_length(steps);
    }

    pub fn advance(&self, message: &str) {
        self.bar.set_message(message.to_string());
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Counts recorded as a run moves through its stages
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub collected: usize,
    pub unique_raw: usize,
    pub parsed: usize,
    pub above_threshold: usize,
    pub analysed: usize,
    pub accepted: usize,
    pub revenue_range: Option<(u64, u64)>,
    pub outputs: Vec<PathBuf>,
    pub duration: Duration,
}

impl RunSummary {
    pub fn print_final_summary(&self) {
        println!("\n=== COLLECTION SUMMARY ===");
        println!("Run Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Records Collected: {}", self.collected);
        println!("Unique Tax IDs: {}", self.unique_raw);
        println!("Parsed Successfully: {}", self.parsed);
        println!("Above Revenue Threshold: {}", self.above_threshold);
        println!("Websites Analysed: {}", self.analysed);
        println!("Companies With CAT Evidence: {}", self.accepted);

        if let Some((min, max)) = self.revenue_range {
            println!("Revenue Range: {} - {} RUB", format_thousands(min), format_thousands(max));
        }
        for path in &self.outputs {
            println!("Results Exported: {}", path.display());
        }
        println!("==========================\n");

        if self.accepted > 0 {
            println!("✅ Collection completed! Found {} companies with CAT evidence.", self.accepted);
        } else {
            println!("✅ Collection completed. No companies passed the evidence filter.");
        }
    }
}

/// 1234567 -> "1,234,567"
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
