//! Async client for the section rendering endpoints, wrapping reqwest.
//!
//! Plain GET requests only. No retries and no caching: every call goes to
//! the server and every result belongs to its caller.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::config::ClientConfig;
use crate::document::{FetchedSection, LivePage};
use crate::patch::patch_elements;
use crate::types::{RenderOutcome, SectionError, SectionMap, SectionResult};

/// HTTP client for fetching rendered sections.
#[derive(Clone)]
pub struct SectionClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl SectionClient {
    pub fn new(config: ClientConfig) -> SectionResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client, config })
    }

    /// Shortcut for a client with default settings against `base_url`.
    pub fn for_origin(base_url: &str) -> SectionResult<Self> {
        Self::new(ClientConfig::new(base_url)?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch one section from the configured section endpoint.
    pub async fn fetch_section(&self, section_id: &str) -> SectionResult<FetchedSection> {
        self.fetch_section_at(section_id, &self.config.section_endpoint)
            .await
    }

    /// Fetch one section as a parsed document: `GET {endpoint}?section_id={id}`.
    pub async fn fetch_section_at(
        &self,
        section_id: &str,
        endpoint: &str,
    ) -> SectionResult<FetchedSection> {
        let body = self.get_text(endpoint, "section_id", section_id).await?;
        let section = FetchedSection::parse(&body);
        tracing::debug!(
            "Parsed section '{section_id}' ({} bytes, {} recoverable markup errors)",
            body.len(),
            section.parse_error_count()
        );
        Ok(section)
    }

    /// Fetch several sections as raw markup: `GET {sections_endpoint}?sections=a,b`.
    ///
    /// Sections the server answers with `null` are left out of the map.
    pub async fn fetch_sections<S: AsRef<str>>(&self, section_ids: &[S]) -> SectionResult<SectionMap> {
        let joined = section_ids
            .iter()
            .map(|id| id.as_ref())
            .collect::<Vec<_>>()
            .join(",");
        let body = self
            .get_text(&self.config.sections_endpoint, "sections", &joined)
            .await?;

        let raw: HashMap<String, Option<String>> = serde_json::from_str(&body)?;
        let sections = raw
            .into_iter()
            .filter_map(|(id, markup)| {
                if markup.is_none() {
                    tracing::debug!("Section '{id}' was not rendered by the server");
                }
                markup.map(|m| (id, m))
            })
            .collect();

        Ok(sections)
    }

    /// Fetch a section from the configured endpoint and patch `page`.
    pub async fn render_element<S: AsRef<str>>(
        &self,
        page: &Mutex<LivePage>,
        section_id: &str,
        selectors: &[S],
    ) -> RenderOutcome {
        self.render_element_at(page, section_id, selectors, &self.config.section_endpoint)
            .await
    }

    /// Fetch a section and replace each selector's live element with the
    /// fetched one.
    ///
    /// Fetch failures are logged and returned as
    /// [`RenderOutcome::FetchFailed`]; the page is untouched in that case.
    /// The page lock is only taken once the fetch has resolved.
    pub async fn render_element_at<S: AsRef<str>>(
        &self,
        page: &Mutex<LivePage>,
        section_id: &str,
        selectors: &[S],
        endpoint: &str,
    ) -> RenderOutcome {
        let mut fetched = match self.fetch_section_at(section_id, endpoint).await {
            Ok(section) => section,
            Err(e) => {
                tracing::warn!("Failed to render section '{section_id}': {e}");
                return RenderOutcome::FetchFailed(e);
            }
        };

        let mut page = page.lock().await;
        let report = patch_elements(&mut page, &mut fetched, selectors);
        tracing::debug!(
            "Rendered section '{section_id}': {} of {} elements replaced",
            report.replaced().len(),
            report.len()
        );

        RenderOutcome::Patched(report)
    }

    /// GET `endpoint?{param}={value}` and read the body, bailing out on a
    /// non-success status before the body is touched.
    async fn get_text(&self, endpoint: &str, param: &str, value: &str) -> SectionResult<String> {
        let url = self.config.resolve(endpoint)?;
        tracing::debug!("GET {url} ({param}={value})");

        let resp = self
            .client
            .get(url)
            .query(&[(param, value)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SectionError::HttpStatus {
                status: status.as_u16(),
            });
        }

        Ok(resp.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = SectionClient::for_origin("http://localhost:9292").unwrap();
        assert_eq!(client.config().section_endpoint, "/");
    }

    #[test]
    fn test_unresolvable_endpoint_fails_before_request() {
        let client = SectionClient::for_origin("http://localhost:9292").unwrap();
        let result = tokio_test::block_on(client.fetch_section_at("cart", "http://[::1"));
        assert!(matches!(result, Err(SectionError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_render_with_bad_endpoint_leaves_page_alone() {
        let client = SectionClient::for_origin("http://localhost:9292").unwrap();
        let page = Mutex::new(LivePage::parse(r#"<div id="cart">old</div>"#));
        let before = page.lock().await.html();

        let outcome = client
            .render_element_at(&page, "cart", &["#cart"], "http://[::1")
            .await;

        assert!(matches!(
            outcome.error(),
            Some(SectionError::InvalidUrl(_))
        ));
        assert_eq!(page.lock().await.html(), before);
    }
}
