//! End-to-end run: collect, deduplicate, normalize, filter by revenue,
//! score websites, filter by evidence, write outputs.
//!
//! Stages run strictly one after another. The cancel flag is checked between
//! stages and between companies; once set the run stops with [`Interrupted`]
//! and nothing is written.

use anyhow::Result;
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use crate::collector::{collect_all, CollectScope};
use crate::company::{Company, RawCompany};
use crate::config::AppConfig;
use crate::evidence::{evidence_decision, EvidenceScorer};
use crate::export::write_outputs;
use crate::fetcher::PageFetcher;
use crate::logger::{RunSummary, StageProgress};
use crate::parser::{dedupe_companies, dedupe_raw, enrich, filter_by_revenue, parse_companies};

/// The run was stopped by the operator
#[derive(Error, Debug)]
#[error("interrupted by user")]
pub struct Interrupted;

fn check_cancel(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::SeqCst) {
        return Err(Interrupted.into());
    }
    Ok(())
}

/// What to feed the pipeline besides configuration
pub struct RunInput {
    /// Records from a seed file, merged after collected ones
    pub seeds: Vec<RawCompany>,
    /// Run the directory and registry collectors
    pub collect: bool,
}

pub async fn run_pipeline<F: PageFetcher>(
    fetcher: &F,
    config: &AppConfig,
    input: RunInput,
    cancel: &AtomicBool,
    show_progress: bool,
) -> Result<RunSummary> {
    let started = Instant::now();
    let mut summary = RunSummary::default();

    info!("Step 1: Collecting companies...");
    let mut raws = if input.collect {
        let progress = StageProgress::new(0, "Collecting companies", show_progress);
        let scope = CollectScope {
            cancel,
            progress: &progress,
        };
        let collected = collect_all(fetcher, config, &scope).await;
        progress.finish();
        collected?
    } else {
        info!("Collectors disabled, using seed records only");
        Vec::new()
    };
    check_cancel(cancel)?;
    raws.extend(input.seeds);
    summary.collected = raws.len();

    let unique = dedupe_raw(raws);
    summary.unique_raw = unique.len();
    info!("Total unique companies collected: {}", unique.len());

    info!("Step 2: Parsing and normalizing company data...");
    let mut companies = dedupe_companies(parse_companies(&unique, Utc::now()));
    summary.parsed = companies.len();
    for company in companies.iter_mut() {
        enrich(company);
    }

    info!("Step 3: Filtering by revenue (min {} RUB)...", config.search.min_revenue);
    let mut companies = filter_by_revenue(companies, config.search.min_revenue);
    summary.above_threshold = companies.len();
    check_cancel(cancel)?;

    info!("Step 4: Analyzing websites for CAT evidence...");
    analyse_websites(fetcher, config, &mut companies, cancel, show_progress, &mut summary).await?;

    info!("Step 5: Filtering by evidence...");
    let accepted: Vec<Company> = companies
        .into_iter()
        .filter(|c| {
            let decision = evidence_decision(&c.evidence, &config.search.strong_keywords);
            info!(
                "{} {} (tax id {}): status {:?}, score {}, strong keyword {}",
                if decision.accepted { "Accepted" } else { "Rejected" },
                c.name,
                c.tax_id,
                c.evidence.status,
                c.evidence.score,
                if decision.strong_match { "yes" } else { "no" }
            );
            decision.accepted
        })
        .collect();
    summary.accepted = accepted.len();
    summary.revenue_range = accepted
        .iter()
        .map(|c| c.revenue)
        .min()
        .zip(accepted.iter().map(|c| c.revenue).max());
    info!("{} companies passed the evidence filter", accepted.len());
    check_cancel(cancel)?;

    if accepted.is_empty() {
        warn!("No companies passed the filters; no output files written");
    } else {
        info!("Step 6: Saving results...");
        summary.outputs = write_outputs(&accepted, config, Path::new(&config.output.directory))?;
    }

    summary.duration = started.elapsed();
    info!("Pipeline completed in {:.2}s", summary.duration.as_secs_f64());
    Ok(summary)
}

async fn analyse_websites<F: PageFetcher>(
    fetcher: &F,
    config: &AppConfig,
    companies: &mut [Company],
    cancel: &AtomicBool,
    show_progress: bool,
    summary: &mut RunSummary,
) -> Result<()> {
    let scorer = EvidenceScorer::new(fetcher, config)?;
    let progress = StageProgress::new(companies.len() as u64, "Analyzing websites", show_progress);
    let total = companies.len();

    for (index, company) in companies.iter_mut().enumerate() {
        if let Err(e) = check_cancel(cancel) {
            progress.finish();
            return Err(e);
        }
        info!("Analyzing {}/{}: {}", index + 1, total, company.name);
        company.evidence = scorer.score(company).await;
        summary.analysed += 1;
        progress.advance(&company.name);

        if index + 1 < total {
            config.evidence.company_delay_ms.pause().await;
        }
    }

    progress.finish();
    check_cancel(cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::company::{EvidenceStatus, Origin};
    use crate::fetcher::Page;
    use crate::logger::capture::capture_logs;
    use crate::rate_limit::DelayRange;
    use tempfile::TempDir;

    struct NoNetwork;

    impl PageFetcher for NoNetwork {
        async fn fetch(&self, _url: &str, _params: &[(&str, &str)]) -> Option<Page> {
            None
        }
    }

    fn seed(tax_id: &str, name: &str, revenue: &str) -> RawCompany {
        let mut raw = RawCompany::new(Origin::SeedFile);
        raw.tax_id = Some(tax_id.to_string());
        raw.name = Some(name.to_string());
        raw.revenue = Some(revenue.to_string());
        raw.website = Some(format!("{}.ru", name.to_lowercase()));
        raw
    }

    fn quiet_config(dir: &Path) -> AppConfig {
        let mut config = AppConfig::embedded().unwrap();
        config.evidence.company_delay_ms = DelayRange::ZERO;
        config.evidence.section_delay_ms = DelayRange::ZERO;
        config.output.directory = dir.to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn test_unreachable_sites_write_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let config = quiet_config(&out);
        let cancel = AtomicBool::new(false);

        let input = RunInput {
            seeds: vec![
                seed("7702070139", "Alpha", "150 млн ₽"),
                seed("770207013", "Beta", "150 млн ₽"),
                seed("7702070140", "Gamma", "50 млн ₽"),
            ],
            collect: false,
        };
        let summary = run_pipeline(&NoNetwork, &config, input, &cancel, false).await.unwrap();

        assert_eq!(summary.collected, 3);
        assert_eq!(summary.parsed, 2);
        assert_eq!(summary.above_threshold, 1);
        assert_eq!(summary.analysed, 1);
        assert_eq!(summary.accepted, 0);
        assert!(summary.outputs.is_empty());
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_cancel_before_analysis() {
        let dir = TempDir::new().unwrap();
        let config = quiet_config(dir.path());
        let cancel = AtomicBool::new(true);

        let input = RunInput {
            seeds: vec![seed("7702070139", "Alpha", "150 млн ₽")],
            collect: false,
        };
        let err = run_pipeline(&NoNetwork, &config, input, &cancel, false).await.unwrap_err();
        assert!(err.downcast_ref::<Interrupted>().is_some());
    }

    #[tokio::test]
    async fn test_fetch_failure_marks_evidence() {
        let config = AppConfig::embedded().unwrap();
        let scorer = EvidenceScorer::new(&NoNetwork, &config).unwrap();
        let mut companies = parse_companies(&[seed("7702070139", "Alpha", "150 млн ₽")], Utc::now());
        companies[0].evidence = scorer.score(&companies[0]).await;
        assert_eq!(companies[0].evidence.status, EvidenceStatus::FetchFailed);
    }

    /// Serves one page per site root
    struct StaticSites;

    impl PageFetcher for StaticSites {
        async fn fetch(&self, url: &str, _params: &[(&str, &str)]) -> Option<Page> {
            let body = match url {
                "https://alpha.ru" => "<p>Работаем в Smartcat</p>",
                "https://gamma.ru" => "<p>Файлы xliff</p>",
                _ => return None,
            };
            Some(Page {
                url: url.to_string(),
                body: body.to_string(),
            })
        }
    }

    #[test]
    fn test_evidence_decisions_logged_per_company() {
        let dir = TempDir::new().unwrap();
        let config = quiet_config(dir.path());
        let cancel = AtomicBool::new(false);
        let input = RunInput {
            seeds: vec![
                seed("7702070139", "Alpha", "150 млн ₽"),
                seed("7702070140", "Gamma", "150 млн ₽"),
            ],
            collect: false,
        };

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let (summary, logs) =
            capture_logs(|| runtime.block_on(run_pipeline(&StaticSites, &config, input, &cancel, false)));
        let summary = summary.unwrap();

        assert_eq!(summary.accepted, 1);
        assert!(
            logs.contains("Accepted Alpha (tax id 7702070139): status Found, score 1, strong keyword yes"),
            "{}",
            logs
        );
        assert!(
            logs.contains("Rejected Gamma (tax id 7702070140): status Found, score 1, strong keyword no"),
            "{}",
            logs
        );
    }
}
