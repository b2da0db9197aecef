use std::time::Duration;

use futures::future::BoxFuture;
use regex::Regex;
use tracing::{debug, warn};

use quill_core::config::FetchConfig;
use quill_core::error::{QuillError, Result};
use quill_core::traits::{FetchOutcome, ResourceFetcher};

/// Fetches resource URLs over HTTP and reduces HTML to plain text.
pub struct HttpFetcher {
    http: reqwest::Client,
    max_length: usize,
    stripper: HtmlStripper,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| QuillError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            max_length: config.max_length,
            stripper: HtmlStripper::new()?,
        })
    }

    async fn fetch_text(&self, url: &str) -> std::result::Result<String, String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ));
        }

        let is_html = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("html"));

        let body = resp
            .text()
            .await
            .map_err(|e| format!("failed to read body: {}", e))?;

        let text = if is_html {
            self.stripper.strip(&body)
        } else {
            body
        };
        Ok(truncate_chars(text, self.max_length))
    }
}

impl ResourceFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FetchOutcome> {
        Box::pin(async move {
            debug!(url, "Fetching resource");
            match self.fetch_text(url).await {
                Ok(text) => FetchOutcome::Content(text),
                Err(reason) => {
                    warn!(url, reason = %reason, "Resource fetch failed, skipping");
                    FetchOutcome::Failed
                }
            }
        })
    }
}

/// Compiled patterns for HTML-to-text reduction.
struct HtmlStripper {
    script: Regex,
    style: Regex,
    tags: Regex,
    blank_runs: Regex,
}

impl HtmlStripper {
    fn new() -> Result<Self> {
        let compile =
            |p: &str| Regex::new(p).map_err(|e| QuillError::Config(format!("bad pattern: {}", e)));
        Ok(Self {
            script: compile(r"(?is)<script[^>]*>.*?</script>")?,
            style: compile(r"(?is)<style[^>]*>.*?</style>")?,
            tags: compile(r"<[^>]+>")?,
            blank_runs: compile(r"\n{3,}")?,
        })
    }

    fn strip(&self, html: &str) -> String {
        let cleaned = self.script.replace_all(html, "");
        let cleaned = self.style.replace_all(&cleaned, "");
        let text = self.tags.replace_all(&cleaned, "");

        let text = text
            .replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&#39;", "'")
            .replace("&amp;", "&");

        self.blank_runs.replace_all(&text, "\n\n").trim().to_string()
    }
}

/// Truncate on a char boundary.
fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}\n\n[truncated at {} chars]", &text[..byte_idx], max_chars),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_styles_and_tags() {
        let stripper = HtmlStripper::new().unwrap();
        let html = "<html><style>p{}</style><script>alert(1)</script>\
                    <p>Tom &amp; Jerry</p>\n\n\n\n<b>end</b></html>";
        assert_eq!(stripper.strip(html), "Tom & Jerry\n\nend");
    }

    #[test]
    fn amp_is_decoded_last() {
        let stripper = HtmlStripper::new().unwrap();
        assert_eq!(stripper.strip("&amp;lt;"), "&lt;");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let out = truncate_chars("héllo wörld".to_string(), 4);
        assert!(out.starts_with("héll"));
        assert!(out.ends_with("[truncated at 4 chars]"));
        assert_eq!(truncate_chars("short".to_string(), 10), "short");
    }

    #[tokio::test]
    async fn unreachable_url_yields_sentinel() {
        let fetcher = HttpFetcher::new(&FetchConfig {
            timeout_secs: 1,
            ..FetchConfig::default()
        })
        .unwrap();
        let outcome = fetcher.fetch("http://127.0.0.1:9/nothing").await;
        assert_eq!(outcome, FetchOutcome::Failed);
    }
}
