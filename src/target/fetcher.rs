//! HTTP fetcher for document-backed targets
//!
//! Loads the HTML that a `DocumentPage` renders, following redirects and
//! rejecting non-HTML responses.

use crate::messaging::PageError;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// A loaded HTML document
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// URL after redirects
    pub final_url: Url,

    /// Raw HTML
    pub html: String,
}

/// Builds the HTTP client used by document targets
///
/// # Example
///
/// ```no_run
/// use pagesweep::target::build_http_client;
///
/// let client = build_http_client().unwrap();
/// ```
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let user_agent = format!("pagesweep/{}", env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and returns its HTML
///
/// | Condition | Result |
/// |-----------|--------|
/// | Network failure | `PageError::Fetch` |
/// | Non-2xx status | `PageError::HttpStatus` |
/// | Content-Type present and not HTML | `PageError::NotHtml` |
pub async fn fetch_document(client: &Client, url: &Url) -> Result<FetchedDocument, PageError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| PageError::Fetch {
            url: url.to_string(),
            message: describe(&e),
        })?;

    let status = response.status();
    let final_url = response.url().clone();

    if !status.is_success() {
        return Err(PageError::HttpStatus {
            url: final_url.to_string(),
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !content_type.is_empty() && !is_html(&content_type) {
        return Err(PageError::NotHtml {
            url: final_url.to_string(),
            content_type,
        });
    }

    let html = response.text().await.map_err(|e| PageError::Fetch {
        url: final_url.to_string(),
        message: describe(&e),
    })?;

    Ok(FetchedDocument { final_url, html })
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        "Connection refused".to_string()
    } else {
        error.to_string()
    }
}
