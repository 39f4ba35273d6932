//! Website evidence scoring against mock company sites.

mod common;

use chrono::Utc;

use catfinder::company::{Company, EvidenceStatus, Origin, RawCompany};
use catfinder::evidence::{passes_evidence_filter, EvidenceScorer};
use catfinder::fetcher::HttpFetcher;
use catfinder::parser::parse_company;
use common::fixtures::load_fixture;
use common::test_config;
use common::wiremock_helpers::{mock_error_server, mount_html_page};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn company_with_site(website: Option<&str>) -> Company {
    let mut raw = RawCompany::new(Origin::SeedFile);
    raw.tax_id = Some("7702070139".to_string());
    raw.name = Some("Альфа Перевод".to_string());
    raw.revenue = Some("150 млн ₽".to_string());
    raw.website = website.map(str::to_string);
    parse_company(&raw, Utc::now()).unwrap()
}

async fn translation_agency_site() -> MockServer {
    let server = MockServer::start().await;
    mount_html_page(&server, "/", &load_fixture("site_home.html")).await;
    mount_html_page(&server, "/vacancies", &load_fixture("site_vacancies.html")).await;
    mount_html_page(&server, "/services", &load_fixture("site_services.html")).await;
    server
}

#[tokio::test]
async fn test_evidence_collected_across_sections() {
    let site = translation_agency_site().await;
    let mut config = test_config("http://127.0.0.1:1", "http://127.0.0.1:1");
    config.http.max_retries = 1;
    let fetcher = HttpFetcher::new(&config.http).unwrap();
    let scorer = EvidenceScorer::new(&fetcher, &config).unwrap();

    let evidence = scorer.score(&company_with_site(Some(&format!("{}/", site.uri())))).await;

    assert_eq!(evidence.status, EvidenceStatus::Found);
    assert_eq!(evidence.matched_products, vec!["SDL Trados", "memoQ", "Smartcat"]);
    assert!(evidence.score >= 6, "score was {}", evidence.score);
    assert!(evidence.text.starts_with("Products mentioned: "));
    assert!(evidence.text.contains("Main page: "));
    assert!(evidence.text.contains("Job postings: translation memory, smartcat"));
    assert!(evidence.text.contains("Services section: xliff, tmx"));
    assert!(!evidence.text.contains("memsource"), "script content must be ignored");
    assert!(passes_evidence_filter(&evidence, &config.search.strong_keywords));
}

#[tokio::test]
async fn test_site_without_terms_has_no_evidence() {
    let site = MockServer::start().await;
    mount_html_page(&site, "/", &load_fixture("site_plain.html")).await;
    let mut config = test_config("http://127.0.0.1:1", "http://127.0.0.1:1");
    config.http.max_retries = 1;
    let fetcher = HttpFetcher::new(&config.http).unwrap();
    let scorer = EvidenceScorer::new(&fetcher, &config).unwrap();

    let evidence = scorer.score(&company_with_site(Some(&site.uri()))).await;
    assert_eq!(evidence.status, EvidenceStatus::NoEvidence);
    assert_eq!(evidence.text, "No CAT system evidence found");
    assert_eq!(evidence.score, 0);
    assert!(!passes_evidence_filter(&evidence, &config.search.strong_keywords));
}

#[tokio::test]
async fn test_unreachable_home_page_is_fetch_failure() {
    let site = mock_error_server(500).await;
    let mut config = test_config("http://127.0.0.1:1", "http://127.0.0.1:1");
    config.http.max_retries = 2;
    let fetcher = HttpFetcher::new(&config.http).unwrap();
    let scorer = EvidenceScorer::new(&fetcher, &config).unwrap();

    let evidence = scorer.score(&company_with_site(Some(&site.uri()))).await;
    assert_eq!(evidence.status, EvidenceStatus::FetchFailed);
    assert_eq!(evidence.text, "Failed to load website");
    // only the home page was attempted
    assert_eq!(site.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_website_is_no_site() {
    let config = test_config("http://127.0.0.1:1", "http://127.0.0.1:1");
    let fetcher = HttpFetcher::new(&config.http).unwrap();
    let scorer = EvidenceScorer::new(&fetcher, &config).unwrap();

    let evidence = scorer.score(&company_with_site(None)).await;
    assert_eq!(evidence.status, EvidenceStatus::NoSite);
    assert_eq!(evidence.text, "No website or invalid URL");
}

#[tokio::test]
async fn test_windows_1251_site_scored() {
    let site = MockServer::start().await;
    let (body, _, _) = encoding_rs::WINDOWS_1251
        .encode("<html><body><p>Услуги: локализация сайтов в Smartcat, ИНН 7702070139</p></body></html>");
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.into_owned(), "text/html; charset=windows-1251"))
        .mount(&site)
        .await;
    let mut config = test_config("http://127.0.0.1:1", "http://127.0.0.1:1");
    config.http.max_retries = 1;
    let fetcher = HttpFetcher::new(&config.http).unwrap();
    let scorer = EvidenceScorer::new(&fetcher, &config).unwrap();

    let evidence = scorer.score(&company_with_site(Some(&site.uri()))).await;
    assert_eq!(evidence.status, EvidenceStatus::Found);
    assert!(evidence.text.contains("локализация"), "summary was {}", evidence.text);
    assert_eq!(evidence.matched_products, vec!["Smartcat"]);
}
