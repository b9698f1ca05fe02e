//! HTTP client abstraction.
//!
//! The fetch loop only needs authenticated GETs returning a status and a
//! body. [`ReqwestClient`] does that over the network; [`MockHttpClient`]
//! serves canned pages for tests.

use crate::config::SyncConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Url;
use std::collections::{HashMap, VecDeque};

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A 200 response with a JSON body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::with_status(200, body)
    }

    /// A response with the given status.
    pub fn with_status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends authenticated GET requests.
///
/// Implementations report transport failures (no response at all) as
/// `Err(message)`; any response, whatever its status, is `Ok`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GETs `url` with the given `Authorization` header value.
    async fn get(&self, url: &Url, authorization: &str) -> Result<HttpResponse, String>;
}

/// [`HttpClient`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Builds a client honoring the config's timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns the builder's message if the TLS backend cannot be set up.
    pub fn new(config: &SyncConfig) -> Result<Self, String> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| e.to_string())?;
        Ok(Self { client })
    }

    fn describe(err: &reqwest::Error, url: &Url) -> String {
        if err.is_timeout() {
            format!("GET {url}: timed out")
        } else if err.is_connect() {
            format!("GET {url}: connection failed: {err}")
        } else {
            format!("GET {url}: {err}")
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &Url, authorization: &str) -> Result<HttpResponse, String> {
        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Self::describe(&e, url))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::describe(&e, url))?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// A recorded request made against a [`MockHttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Requested URL.
    pub url: String,
    /// `Authorization` header value.
    pub authorization: String,
}

/// An [`HttpClient`] serving queued replies per URL.
///
/// Replies for one URL are served in the order they were queued; the last
/// one is repeated once the queue runs down to it. Unknown URLs get a 404
/// with a `detail` message.
#[derive(Debug, Default)]
pub struct MockHttpClient {
    replies: Mutex<HashMap<String, VecDeque<Result<HttpResponse, String>>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockHttpClient {
    /// Creates a client with no replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `url`.
    pub fn respond(&self, url: &str, response: HttpResponse) {
        self.replies
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(Ok(response));
    }

    /// Queues a 200 response with a JSON body for `url`.
    pub fn respond_json(&self, url: &str, body: &serde_json::Value) {
        self.respond(url, HttpResponse::ok(body.to_string()));
    }

    /// Queues a transport failure for `url`.
    pub fn fail(&self, url: &str, message: &str) {
        self.replies
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(Err(message.to_string()));
    }

    /// All requests made so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// URLs requested so far, oldest first.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.url.clone()).collect()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &Url, authorization: &str) -> Result<HttpResponse, String> {
        self.requests.lock().push(RecordedRequest {
            url: url.to_string(),
            authorization: authorization.to_string(),
        });

        let mut replies = self.replies.lock();
        match replies.get_mut(url.as_str()) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Err("reply queue drained".into())),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err("reply queue drained".into())),
            None => Ok(HttpResponse::with_status(
                404,
                r#"{"detail":"Not found."}"#,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn mock_serves_in_order_then_repeats() {
        let client = MockHttpClient::new();
        client.respond("http://api/a", HttpResponse::ok("first"));
        client.respond("http://api/a", HttpResponse::ok("second"));

        let a = url("http://api/a");
        assert_eq!(client.get(&a, "Token t").await.unwrap().body, b"first");
        assert_eq!(client.get(&a, "Token t").await.unwrap().body, b"second");
        assert_eq!(client.get(&a, "Token t").await.unwrap().body, b"second");
        assert_eq!(client.requests().len(), 3);
        assert_eq!(client.requests()[0].authorization, "Token t");
    }

    #[tokio::test]
    async fn mock_unknown_url_is_404() {
        let client = MockHttpClient::new();
        let response = client.get(&url("http://api/missing"), "").await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn mock_transport_failure() {
        let client = MockHttpClient::new();
        client.fail("http://api/down", "connection refused");
        let err = client.get(&url("http://api/down"), "").await.unwrap_err();
        assert_eq!(err, "connection refused");
    }

    #[test]
    fn reqwest_client_builds() {
        let config = SyncConfig::default().with_timeout(std::time::Duration::from_secs(5));
        assert!(ReqwestClient::new(&config).is_ok());
    }
}
