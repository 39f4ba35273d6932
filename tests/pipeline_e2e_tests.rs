//! Full runs of the pipeline against mock directories and company sites,
//! writing into temporary output directories.

mod common;

use std::fs;
use std::sync::atomic::AtomicBool;

use catfinder::company::{Origin, RawCompany};
use catfinder::export::{CSV_FILE, REPORT_FILE, XLSX_FILE};
use catfinder::fetcher::HttpFetcher;
use catfinder::pipeline::{run_pipeline, RunInput};
use catfinder::seed::load_seed_file;
use common::fixtures::{load_fixture, render_fixture};
use common::test_config;
use common::wiremock_helpers::{html_response, mount_html_page};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer};

fn seed(tax_id: &str, name: &str, revenue: &str, website: Option<&str>) -> RawCompany {
    let mut raw = RawCompany::new(Origin::SeedFile);
    raw.tax_id = Some(tax_id.to_string());
    raw.name = Some(name.to_string());
    raw.revenue = Some(revenue.to_string());
    raw.website = website.map(str::to_string);
    raw
}

async fn trados_site() -> MockServer {
    let site = MockServer::start().await;
    mount_html_page(
        &site,
        "/",
        "<html><body><p>Наши переводчики работают в SDL Trados Studio.</p></body></html>",
    )
    .await;
    site
}

#[tokio::test]
async fn test_seed_run_filters_and_writes_outputs() {
    let site = trados_site().await;
    let out = TempDir::new().unwrap();
    let mut config = test_config("http://127.0.0.1:1", "http://127.0.0.1:1");
    config.http.max_retries = 1;
    config.output.directory = out.path().join("data").to_string_lossy().into_owned();
    let fetcher = HttpFetcher::new(&config.http).unwrap();
    let cancel = AtomicBool::new(false);

    let input = RunInput {
        seeds: vec![
            seed("7702070139", "Альфа Перевод", "150 млн ₽", Some(&site.uri())),
            seed("77020701391", "Бета", "150 млн ₽", Some(&site.uri())),
            seed("7702070140", "Гамма", "50 млн ₽", Some(&site.uri())),
        ],
        collect: false,
    };
    let summary = run_pipeline(&fetcher, &config, input, &cancel, false).await.unwrap();

    assert_eq!(summary.collected, 3);
    assert_eq!(summary.parsed, 2);
    assert_eq!(summary.above_threshold, 1);
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.revenue_range, Some((150_000_000, 150_000_000)));
    assert_eq!(summary.outputs.len(), 3);

    let data = out.path().join("data");
    assert!(data.join(XLSX_FILE).exists());

    let csv = fs::read_to_string(data.join(CSV_FILE)).unwrap();
    let csv = csv.trim_start_matches('\u{feff}');
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("tax_id,name,revenue,website,evidence_text"));
    let row = lines.next().unwrap();
    assert!(row.starts_with("7702070139,Альфа Перевод,150000000,"));
    assert!(row.contains("SDL Trados"));
    assert!(row.contains(",seed_file,"));
    assert!(lines.next().is_none());

    let report = fs::read_to_string(data.join(REPORT_FILE)).unwrap();
    assert!(report.contains("Total companies found: 1"));
    assert!(report.contains("seed_file: 1 companies"));
    assert!(report.contains("1. Альфа Перевод"));
}

#[tokio::test]
async fn test_nothing_written_when_no_evidence() {
    let site = MockServer::start().await;
    mount_html_page(&site, "/", &load_fixture("site_plain.html")).await;
    let out = TempDir::new().unwrap();
    let mut config = test_config("http://127.0.0.1:1", "http://127.0.0.1:1");
    config.http.max_retries = 1;
    config.output.directory = out.path().join("data").to_string_lossy().into_owned();
    let fetcher = HttpFetcher::new(&config.http).unwrap();
    let cancel = AtomicBool::new(false);

    let input = RunInput {
        seeds: vec![seed("7702070139", "Строй", "2 млрд", Some(&site.uri()))],
        collect: false,
    };
    let summary = run_pipeline(&fetcher, &config, input, &cancel, false).await.unwrap();

    assert_eq!(summary.accepted, 0);
    assert!(summary.outputs.is_empty());
    assert!(!out.path().join("data").exists());
}

#[tokio::test]
async fn test_collected_and_seed_records_deduplicated() {
    let site = trados_site().await;
    let directory = MockServer::start().await;
    let registry = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "перевод"))
        .respond_with(html_response(&load_fixture("directory_search.html")))
        .mount(&directory)
        .await;
    let alpha = render_fixture(
        "directory_company.html",
        &[
            ("name", "ООО «Альфа Перевод»"),
            ("inn", "7702070139"),
            ("revenue", "150 млн ₽"),
            ("employees", "120"),
            ("website", &site.uri()),
            ("directory", &directory.uri()),
        ],
    );
    mount_html_page(&directory, "/id/1", &alpha).await;

    let out = TempDir::new().unwrap();
    let mut config = test_config(&directory.uri(), &registry.uri());
    config.collector.search_keywords = vec!["перевод".to_string()];
    config.collector.revenue_sort_terms = vec!["перевод".to_string()];
    config.http.max_retries = 1;
    config.output.directory = out.path().to_string_lossy().into_owned();
    let fetcher = HttpFetcher::new(&config.http).unwrap();
    let cancel = AtomicBool::new(false);

    let seeds_file = out.path().join("seeds.csv");
    fs::write(&seeds_file, "inn,name,revenue,site\n7702070139,Альфа (seed),150 млн ₽,alpha.ru\n").unwrap();
    let seeds = load_seed_file(&seeds_file).unwrap();

    let summary = run_pipeline(&fetcher, &config, RunInput { seeds, collect: true }, &cancel, false)
        .await
        .unwrap();

    // keyword strategy and revenue strategy both find /id/1, plus the seed row
    assert_eq!(summary.collected, 3);
    assert_eq!(summary.unique_raw, 1);
    assert_eq!(summary.accepted, 1);

    let csv = fs::read_to_string(out.path().join(CSV_FILE)).unwrap();
    assert!(csv.contains("ООО «Альфа Перевод»"));
    assert!(csv.contains(",directory_search,"));
    assert!(!csv.contains("Альфа (seed)"));
}
