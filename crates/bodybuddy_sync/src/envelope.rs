//! Decoding of paginated response envelopes.
//!
//! A page looks like `{"count": 80, "next": "...", "previous": null,
//! "results": [...]}`; error responses carry `{"detail": "..."}`.

use crate::error::{SyncError, SyncResult};
use crate::http::HttpResponse;
use crate::model::json_type;
use reqwest::Url;
use serde_json::{Map, Value};

/// One untyped remote record.
pub type RemoteRecord = Map<String, Value>;

/// A decoded page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// URL the page was fetched from.
    pub url: Url,
    /// Zero-based position of the page within the sync.
    pub index: usize,
    /// Records in server order.
    pub records: Vec<RemoteRecord>,
    /// Raw `next` link, if the server sent one as a string.
    pub next: Option<String>,
    /// Total record count reported by the server, if any.
    pub count: Option<u64>,
}

impl Page {
    /// Parses the `next` link.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidUrl`] if the link is not an absolute URL.
    pub fn next_url(&self) -> SyncResult<Option<Url>> {
        match &self.next {
            Some(next) => Url::parse(next)
                .map(Some)
                .map_err(|_| SyncError::InvalidUrl(next.clone())),
            None => Ok(None),
        }
    }
}

/// Decodes a response into a page.
///
/// Checks run in this order: empty body, JSON object, status, `results`.
pub(crate) fn decode(response: &HttpResponse, url: Url, index: usize) -> SyncResult<Page> {
    if response.body.is_empty() {
        return Err(SyncError::MissingData);
    }

    let envelope: Map<String, Value> = match serde_json::from_slice::<Value>(&response.body) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            return Err(SyncError::Parsing(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            )))
        }
        Err(e) => return Err(SyncError::Parsing(e.to_string())),
    };

    if response.status != 200 {
        let message = match envelope.get("detail") {
            Some(Value::String(detail)) => detail.clone(),
            _ => format!("status: {}", response.status),
        };
        return Err(SyncError::InvalidResponse(message));
    }

    let records = match envelope.get("results") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Object(record) => Some(record.clone()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>(),
        _ => None,
    }
    .ok_or_else(|| SyncError::invalid_response("missing response"))?;

    let next = match envelope.get("next") {
        Some(Value::String(next)) => Some(next.clone()),
        _ => None,
    };
    let count = envelope.get("count").and_then(Value::as_u64);

    Ok(Page {
        url,
        index,
        records,
        next,
        count,
    })
}
