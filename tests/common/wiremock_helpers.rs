use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 200 response carrying an HTML body
pub fn html_response(html: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_raw(html.as_bytes().to_vec(), "text/html; charset=utf-8")
}

/// Serve `html` at `url_path` on an existing server
pub async fn mount_html_page(server: &MockServer, url_path: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(html_response(html))
        .mount(server)
        .await;
}

/// Creates a mock HTTP server that serves HTML content at the specified path.
pub async fn mock_html_page(url_path: &str, html: &str) -> MockServer {
    let server = MockServer::start().await;
    mount_html_page(&server, url_path, html).await;
    server
}

/// Creates a mock HTTP server that returns the specified HTTP error status code.
///
/// Useful for testing error handling for 4xx and 5xx responses.
pub async fn mock_error_server(status_code: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status_code))
        .mount(&server)
        .await;

    server
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_html_page_serves_html() {
        let server = mock_html_page("/id/1", "<html><body><h1>Альфа</h1></body></html>").await;

        let response = reqwest::get(format!("{}/id/1", server.uri())).await.unwrap();
        assert_eq!(response.status(), 200);
        assert!(response.headers()["content-type"].to_str().unwrap().contains("text/html"));
        assert!(response.text().await.unwrap().contains("Альфа"));
    }

    #[tokio::test]
    async fn test_mock_error_server_returns_status_code() {
        let server = mock_error_server(503).await;

        let response = reqwest::get(format!("{}/any-path", server.uri())).await.unwrap();
        assert_eq!(response.status(), 503);
    }
}
