//! Company collectors for business-directory backends.
//!
//! Each backend turns search pages into [`RawCompany`] records tagged with
//! its origin. Deduplication happens later in the pipeline.

pub mod directory;
pub mod registry;

pub use directory::DirectoryCollector;
pub use registry::RegistryCollector;

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use url::Url;

use crate::company::RawCompany;
use crate::config::AppConfig;
use crate::fetcher::PageFetcher;
use crate::logger::StageProgress;
use crate::normalize::{is_valid_url, normalize_name};

/// Cancellation flag and progress bar shared by a collection run
pub struct CollectScope<'a> {
    pub cancel: &'a AtomicBool,
    pub progress: &'a StageProgress,
}

impl CollectScope<'_> {
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Run every strategy in order: keyword search, revenue-sorted search, registry lookup
pub async fn collect_all<F: PageFetcher>(
    fetcher: &F,
    config: &AppConfig,
    scope: &CollectScope<'_>,
) -> anyhow::Result<Vec<RawCompany>> {
    let directory = DirectoryCollector::new(fetcher, config)?;
    let registry = RegistryCollector::new(fetcher, config)?;

    scope.progress.inc_length(
        (config.collector.search_keywords.len() + config.collector.revenue_sort_terms.len() + 1) as u64,
    );

    let mut companies = directory.collect_by_keywords(scope).await;
    info!("Keyword search collected {} companies", companies.len());
    if scope.cancelled() {
        return Ok(companies);
    }
    config.collector.strategy_delay_ms.pause().await;

    let by_revenue = directory.collect_by_revenue(scope).await;
    info!("Revenue-sorted search collected {} companies", by_revenue.len());
    companies.extend(by_revenue);
    if scope.cancelled() {
        return Ok(companies);
    }
    config.collector.strategy_delay_ms.pause().await;

    let from_registry = registry.collect(scope).await;
    info!("Registry lookup collected {} companies", from_registry.len());
    companies.extend(from_registry);
    scope.progress.advance("registry");

    Ok(companies)
}

/// Resolve matching links against `base`, dropping duplicates, up to `limit`
pub(crate) fn resolve_links(document: &Html, selector: &Selector, base: &Url, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    document
        .select(selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(|url| url.to_string())
        .filter(|url| seen.insert(url.clone()))
        .take(limit)
        .collect()
}

/// First absolute link that does not point back at `own` and looks like a real site
pub(crate) fn first_external_link(document: &Html, selector: &Selector, own: &Url) -> Option<String> {
    document
        .select(selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| href.starts_with("http://") || href.starts_with("https://"))
        .filter(|href| !points_at(href, own))
        .find(|href| is_valid_url(href))
        .map(str::to_string)
}

fn points_at(href: &str, own: &Url) -> bool {
    let Ok(url) = Url::parse(href) else {
        return false;
    };
    let (Some(host), Some(own_host)) = (url.host_str(), own.host_str()) else {
        return false;
    };
    let host = host.trim_start_matches("www.");
    let own_host = own_host.trim_start_matches("www.");
    let same_host = host == own_host || host.ends_with(&format!(".{}", own_host));
    same_host && url.port_or_known_default() == own.port_or_known_default()
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    normalize_name(&element.text().collect::<Vec<_>>().join(" "))
}

pub(crate) fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    static LINKS: once_cell::sync::Lazy<Selector> =
        once_cell::sync::Lazy::new(|| Selector::parse(r#"a[href*="/id/"]"#).unwrap());
    static ANCHORS: once_cell::sync::Lazy<Selector> =
        once_cell::sync::Lazy::new(|| Selector::parse("a[href]").unwrap());

    #[test]
    fn test_resolve_links_dedupes_and_limits() {
        let html = Html::parse_document(
            r#"<a href="/id/1">a</a><a href="/id/1">a again</a><a href="/about">x</a>
               <a href="/id/2">b</a><a href="https://other.ru/id/3">c</a>"#,
        );
        let base = Url::parse("https://dir.example.ru").unwrap();
        let links = resolve_links(&html, &LINKS, &base, 2);
        assert_eq!(links, vec!["https://dir.example.ru/id/1", "https://dir.example.ru/id/2"]);
    }

    #[test]
    fn test_first_external_link_skips_own_host() {
        let html = Html::parse_document(
            r#"<a href="/id/1">self</a>
               <a href="https://www.dir.example.ru/help">help</a>
               <a href="https://dir.example.ru/x">self abs</a>
               <a href="mailto:a@b.ru">mail</a>
               <a href="https://alpha-translate.ru/">site</a>"#,
        );
        let own = Url::parse("https://dir.example.ru").unwrap();
        assert_eq!(
            first_external_link(&html, &ANCHORS, &own).as_deref(),
            Some("https://alpha-translate.ru/")
        );
    }

    #[test]
    fn test_same_host_other_port_is_external() {
        let own = Url::parse("http://127.0.0.1:4000").unwrap();
        assert!(points_at("http://127.0.0.1:4000/id/1", &own));
        assert!(!points_at("http://127.0.0.1:5000/", &own));
    }
}
