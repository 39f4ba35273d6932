//! HTTP page fetching with retries, pacing and user-agent rotation
//!
//! Every component that needs a page goes through [`PageFetcher`]. A failed
//! fetch is logged and reported as `None`; callers skip the URL.

use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::bytes::Regex as BytesRegex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use scraper::Html;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::rate_limit::RetryHelper;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// How far into the body a `<meta>` charset declaration is looked for
const META_SNIFF_BYTES: usize = 2048;

static META_CHARSET_REGEX: Lazy<BytesRegex> = Lazy::new(|| {
    BytesRegex::new(r#"(?i-u)<meta[^>]+charset\s*=\s*["']?\s*([A-Za-z0-9_:.\-]+)"#).unwrap()
});

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(StatusCode),

    #[error("unexpected content type '{0}' (expected text/html)")]
    NotHtml(String),

    #[error("failed to read body: {0}")]
    Body(#[source] reqwest::Error),
}

impl FetchError {
    /// Content-type mismatches will not change on retry
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::NotHtml(_))
    }
}

/// A fetched HTML page
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects
    pub url: String,
    pub body: String,
}

impl Page {
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// Anything that can turn a URL into a page
#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    /// Fetch `url` with optional query parameters; `None` means skip this URL
    async fn fetch(&self, url: &str, params: &[(&str, &str)]) -> Option<Page>;
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    client: reqwest::Client,
    config: HttpConfig,
    retry: RetryHelper,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(&config.accept_language)?);

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(5))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            retry: RetryHelper::new(config),
        })
    }

    fn pick_user_agent(&self) -> &str {
        let agents = &self.config.user_agents;
        let chosen = if self.config.user_agent_rotation {
            agents.choose(&mut rand::thread_rng())
        } else {
            agents.first()
        };
        chosen.map(String::as_str).unwrap_or_default()
    }

    async fn attempt(&self, url: &str, params: &[(&str, &str)], attempt: u32) -> Result<Page, FetchError> {
        let user_agent = self.pick_user_agent();
        debug!("GET {} (attempt {}/{})", url, attempt, self.retry.max_retries());

        let response = self
            .client
            .get(url)
            .query(params)
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.to_ascii_lowercase().contains("text/html") {
            return Err(FetchError::NotHtml(content_type));
        }

        let final_url = response.url().to_string();
        let bytes = read_response_body_capped(response, self.config.max_body_bytes).await?;
        let body = decode_html(&bytes, &content_type);

        Ok(Page { url: final_url, body })
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, params: &[(&str, &str)]) -> Option<Page> {
        let result = self
            .retry
            .with_retry(move |attempt| self.attempt(url, params, attempt), FetchError::is_retryable)
            .await;

        match result {
            Ok(page) => Some(page),
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                None
            }
        }
    }
}

/// Read an HTTP response body, stopping at `max_bytes`
async fn read_response_body_capped(response: reqwest::Response, max_bytes: usize) -> Result<Vec<u8>, FetchError> {
    use futures::StreamExt;

    let mut body = Vec::with_capacity(max_bytes.min(256 * 1024));
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Body)?;
        let remaining = max_bytes.saturating_sub(body.len());
        if remaining == 0 {
            debug!("HTTP response truncated at {} bytes", max_bytes);
            break;
        }
        body.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
    }

    Ok(body)
}

/// Charset named by a Content-Type header, e.g. `text/html; charset=windows-1251`
fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, value)| Encoding::for_label(value.trim().trim_matches('"').as_bytes()))
}

/// Charset declared by `<meta charset>` or `<meta http-equiv content="...; charset=">`
fn meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(META_SNIFF_BYTES)];
    let label = META_CHARSET_REGEX.captures(head)?.get(1)?;
    Encoding::for_label(label.as_bytes())
}

/// Decode an HTML body: byte-order mark, then header charset, then meta charset, then UTF-8.
/// Invalid sequences (such as a character cut by the size cap) become U+FFFD.
pub fn decode_html(body: &[u8], content_type: &str) -> String {
    let encoding = header_charset(content_type)
        .or_else(|| meta_charset(body))
        .unwrap_or(UTF_8);
    let (text, used, had_errors) = encoding.decode(body);
    if had_errors {
        debug!("Body contained invalid {} sequences", used.name());
    }
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_html_is_terminal() {
        assert!(!FetchError::NotHtml("application/json".into()).is_retryable());
        assert!(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE).is_retryable());
        assert!(FetchError::Status(StatusCode::NOT_FOUND).is_retryable());
    }

    #[test]
    fn test_user_agent_without_rotation_is_first() {
        let mut config = crate::config::AppConfig::embedded().unwrap().http;
        config.user_agent_rotation = false;
        let fetcher = HttpFetcher::new(&config).unwrap();
        assert_eq!(fetcher.pick_user_agent(), config.user_agents[0]);
    }

    #[test]
    fn test_user_agent_rotation_picks_configured_agent() {
        let config = crate::config::AppConfig::embedded().unwrap().http;
        let fetcher = HttpFetcher::new(&config).unwrap();
        for _ in 0..10 {
            let ua = fetcher.pick_user_agent();
            assert!(config.user_agents.iter().any(|a| a == ua));
        }
    }

    #[test]
    fn test_decode_uses_header_charset() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode("<p>Выручка</p>");
        assert_eq!(decode_html(&bytes, "text/html; charset=windows-1251"), "<p>Выручка</p>");
        assert_eq!(decode_html(&bytes, "text/html; Charset=\"cp1251\""), "<p>Выручка</p>");
    }

    #[test]
    fn test_decode_sniffs_meta_charset() {
        let (bytes, _, _) = encoding_rs::KOI8_R.encode(
            r#"<html><head><meta http-equiv="Content-Type" content="text/html; charset=koi8-r"></head><body>ИНН</body></html>"#,
        );
        assert!(decode_html(&bytes, "text/html").contains("<body>ИНН</body>"));

        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(r#"<meta charset='windows-1251'><p>локализация</p>"#);
        assert!(decode_html(&bytes, "text/html").contains("локализация"));
    }

    #[test]
    fn test_decode_defaults_to_utf8() {
        assert_eq!(decode_html("<p>Альфа</p>".as_bytes(), "text/html"), "<p>Альфа</p>");
        // header wins over a conflicting meta declaration
        let body = r#"<meta charset="windows-1251"><p>Альфа</p>"#;
        assert!(decode_html(body.as_bytes(), "text/html; charset=utf-8").contains("Альфа"));
        // a character cut by the body cap is replaced, not dropped with its neighbours
        let cut = &"Альфа".as_bytes()[..5];
        assert_eq!(decode_html(cut, "text/html"), "Ал\u{FFFD}");
    }

    #[test]
    fn test_page_document_parses() {
        let page = Page {
            url: "https://example.ru/".into(),
            body: "<html><body><h1>Альфа</h1></body></html>".into(),
        };
        let doc = page.document();
        let h1 = scraper::Selector::parse("h1").unwrap();
        assert_eq!(doc.select(&h1).next().unwrap().text().collect::<String>(), "Альфа");
    }
}
