//! The paginated fetch loop.

use crate::config::SyncConfig;
use crate::envelope::{self, Page};
use crate::error::{SyncError, SyncResult};
use crate::http::HttpClient;
use crate::registry::EntityKind;
use reqwest::Url;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Totals of one walk over a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Pages handed to the page handler.
    pub pages: usize,
    /// Records across those pages.
    pub records: usize,
}

/// Walks a remote collection page by page.
pub struct PageFetcher<C> {
    config: SyncConfig,
    client: C,
}

impl<C: HttpClient> PageFetcher<C> {
    /// Creates a fetcher sending requests through `client`.
    pub fn new(config: SyncConfig, client: C) -> Self {
        Self { config, client }
    }

    /// The fetcher's configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The underlying HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetches and decodes a single page.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Request`] on transport failure, or the decoding
    /// error of the envelope.
    pub async fn fetch_page(&self, url: Url, index: usize) -> SyncResult<Page> {
        debug!(url = %url, index, "requesting page");
        let response = self
            .client
            .get(&url, &self.config.authorization())
            .await
            .map_err(SyncError::Request)?;
        envelope::decode(&response, url, index)
    }

    /// Fetches every page of `kind` in order, handing each to `on_page`.
    ///
    /// The next page is requested only after `on_page` returned for the
    /// previous one. The walk stops at the first error, whether from the
    /// network, the envelope or the handler, and returns it.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered. A `next` link that points back to
    /// an already fetched page is reported as [`SyncError::InvalidResponse`].
    pub async fn fetch_all<F>(&self, kind: EntityKind, mut on_page: F) -> SyncResult<FetchSummary>
    where
        F: FnMut(&Page) -> SyncResult<()> + Send,
    {
        let mut summary = FetchSummary::default();
        let mut visited = HashSet::new();
        let mut next = Some(self.config.endpoint_url(kind)?);

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                return Err(SyncError::InvalidResponse(format!(
                    "pagination loops back to {url}"
                )));
            }

            let page = self.fetch_page(url, summary.pages).await?;
            debug!(
                kind = %kind,
                url = %page.url,
                index = page.index,
                records = page.records.len(),
                "page fetched"
            );

            if let Err(err) = on_page(&page) {
                warn!(kind = %kind, url = %page.url, error = %err, "page handler failed, stopping");
                return Err(err);
            }

            summary.pages += 1;
            summary.records += page.records.len();
            next = page.next_url()?;
        }

        Ok(summary)
    }
}

impl<C> std::fmt::Debug for PageFetcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFetcher")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockHttpClient};
    use serde_json::json;

    const BASE: &str = "http://api.test/api/v2/";

    fn fetcher(client: MockHttpClient) -> PageFetcher<MockHttpClient> {
        PageFetcher::new(SyncConfig::new(BASE, "t0k3n"), client)
    }

    fn page_url(n: usize) -> String {
        format!("{BASE}language?page={n}")
    }

    fn three_pages() -> MockHttpClient {
        let client = MockHttpClient::new();
        client.respond_json(
            &format!("{BASE}language"),
            &json!({"next": page_url(2), "results": [{"id": 1}]}),
        );
        client.respond_json(
            &page_url(2),
            &json!({"next": page_url(3), "results": [{"id": 2}, {"id": 3}]}),
        );
        client.respond_json(&page_url(3), &json!({"next": null, "results": [{"id": 4}]}));
        client
    }

    #[tokio::test]
    async fn follows_next_until_null() {
        let fetcher = fetcher(three_pages());
        let mut seen = Vec::new();

        let summary = fetcher
            .fetch_all(EntityKind::Language, |page| {
                seen.push(page.index);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(summary, FetchSummary { pages: 3, records: 4 });
        assert_eq!(
            fetcher.client().requested_urls(),
            vec![format!("{BASE}language"), page_url(2), page_url(3)]
        );
    }

    #[tokio::test]
    async fn sends_token_header() {
        let fetcher = fetcher(three_pages());
        fetcher.fetch_all(EntityKind::Language, |_| Ok(())).await.unwrap();
        assert!(fetcher
            .client()
            .requests()
            .iter()
            .all(|r| r.authorization == "Token t0k3n"));
    }

    #[tokio::test]
    async fn handler_failure_stops_the_walk() {
        let fetcher = fetcher(three_pages());
        let err = fetcher
            .fetch_all(EntityKind::Language, |page| {
                if page.index == 1 {
                    Err(SyncError::invalid_response("boom"))
                } else {
                    Ok(())
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::InvalidResponse(m) if m == "boom"));
        assert_eq!(fetcher.client().requested_urls().len(), 2);
    }

    #[tokio::test]
    async fn error_status_never_reaches_handler() {
        let client = MockHttpClient::new();
        client.respond(
            &format!("{BASE}weightunit"),
            HttpResponse::with_status(404, json!({"detail": "not found"}).to_string()),
        );
        let fetcher = fetcher(client);

        let mut calls = 0;
        let err = fetcher
            .fetch_all(EntityKind::WeightUnit, |_| {
                calls += 1;
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::InvalidResponse(m) if m == "not found"));
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn transport_error_is_request_error() {
        let client = MockHttpClient::new();
        client.fail(&format!("{BASE}language"), "connection refused");
        let err = fetcher(client)
            .fetch_all(EntityKind::Language, |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Request(m) if m == "connection refused"));
    }

    #[tokio::test]
    async fn bad_next_link_after_handler() {
        let client = MockHttpClient::new();
        client.respond_json(
            &format!("{BASE}language"),
            &json!({"next": "::nope::", "results": [{"id": 1}]}),
        );
        let mut handled = 0;
        let err = fetcher(client)
            .fetch_all(EntityKind::Language, |_| {
                handled += 1;
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::InvalidUrl(n) if n == "::nope::"));
        assert_eq!(handled, 1);
    }

    #[tokio::test]
    async fn self_referencing_next_is_rejected() {
        let client = MockHttpClient::new();
        client.respond_json(
            &format!("{BASE}language"),
            &json!({"next": format!("{BASE}language"), "results": []}),
        );
        let err = fetcher(client)
            .fetch_all(EntityKind::Language, |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidResponse(_)));
    }
}
