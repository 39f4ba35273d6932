#![allow(dead_code)]

pub mod fixtures;
pub mod wiremock_helpers;

use catfinder::config::AppConfig;
use catfinder::rate_limit::DelayRange;

/// Embedded configuration pointed at mock servers, with every pause removed
pub fn test_config(directory_url: &str, registry_url: &str) -> AppConfig {
    let mut config = AppConfig::embedded().expect("embedded config is valid");
    config.sources.directory_base_url = directory_url.to_string();
    config.sources.registry_base_url = registry_url.to_string();

    config.collector.keyword_delay_ms = DelayRange::ZERO;
    config.collector.revenue_term_delay_ms = DelayRange::ZERO;
    config.collector.registry_delay_ms = DelayRange::ZERO;
    config.collector.strategy_delay_ms = DelayRange::ZERO;
    config.http.request_delay_ms = DelayRange::ZERO;
    config.http.backoff_base_delay_ms = 0;
    config.http.timeout_secs = 5;
    config.evidence.section_delay_ms = DelayRange::ZERO;
    config.evidence.company_delay_ms = DelayRange::ZERO;

    config.validate().expect("test config is valid");
    config
}
