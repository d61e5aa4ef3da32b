//! Supabase (PostgREST) implementation of [`RemoteBackend`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::remote::{RemoteBackend, RemoteError, RemoteResult};
use crate::config::RemoteEndpoint;
use crate::models::EntityKind;
use crate::util::compact_text;

const REST_PATH: &str = "/rest/v1";
const PAGE_SIZE: usize = 1000;

/// Row access over `https://<project>/rest/v1/<table>`.
///
/// Requests carry the project anon key as `apikey` and the user's access
/// token as the bearer credential, so row-level security on the backend
/// scopes every call to the signed-in user.
#[derive(Clone)]
pub struct SupabaseRestBackend {
    rest_url: String,
    anon_key: String,
    access_token: String,
    request_timeout: Duration,
    client: Client,
}

impl std::fmt::Debug for SupabaseRestBackend {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SupabaseRestBackend")
            .field("rest_url", &self.rest_url)
            .field("anon_key", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SupabaseRestBackend {
    /// Build a client whose requests each time out after `request_timeout`.
    pub fn new(endpoint: &RemoteEndpoint, request_timeout: Duration) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|error| {
                RemoteError::Network(format!("failed to build HTTP client: {error}"))
            })?;

        Ok(Self {
            rest_url: normalize_rest_url(&endpoint.url),
            anon_key: endpoint.anon_key.clone(),
            access_token: endpoint.access_token.clone(),
            request_timeout,
            client,
        })
    }

    fn table_url(&self, kind: EntityKind) -> String {
        format!("{}/{}", self.rest_url, kind.table())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| map_transport_error(&error, self.request_timeout))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }

    /// Read every row matching `filters`, one `PAGE_SIZE` page at a time.
    ///
    /// The server may cap a single response below the requested limit, so a
    /// short page only ends the listing when `Content-Range` carries no total.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        filters: &[(&'static str, String)],
        order: &str,
    ) -> RemoteResult<Vec<T>> {
        let mut rows = Vec::new();
        loop {
            let offset = rows.len();
            let request = self
                .client
                .get(self.table_url(kind))
                .query(&page_query(filters, order, offset))
                .header("Prefer", "count=exact");
            let response = self.send(request).await?;
            let range = response
                .headers()
                .get("Content-Range")
                .and_then(|value| value.to_str().ok())
                .and_then(parse_content_range);
            let page = response
                .json::<Vec<T>>()
                .await
                .map_err(|error| RemoteError::Payload(error.to_string()))?;

            let received = page.len();
            rows.extend(page);
            if received == 0 || is_last_page(range, rows.len(), received) {
                return Ok(rows);
            }
        }
    }
}

#[async_trait]
impl RemoteBackend for SupabaseRestBackend {
    async fn upsert_one(&self, kind: EntityKind, row: &serde_json::Value) -> RemoteResult<()> {
        let request = self
            .client
            .post(self.table_url(kind))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row);
        self.send(request).await?;
        Ok(())
    }

    async fn delete_one(&self, kind: EntityKind, id: &str) -> RemoteResult<()> {
        let request = self
            .client
            .delete(self.table_url(kind))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal");
        self.send(request).await?;
        Ok(())
    }

    async fn list_ids(&self, kind: EntityKind, owner_id: &str) -> RemoteResult<Vec<String>> {
        #[derive(Deserialize)]
        struct IdRow {
            id: String,
        }

        let filters = vec![
            ("select", "id".to_string()),
            ("owner_id", format!("eq.{owner_id}")),
        ];
        let rows: Vec<IdRow> = self.get_all_pages(kind, &filters, "id.asc").await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn list_changed_since(
        &self,
        kind: EntityKind,
        owner_id: &str,
        since: Option<i64>,
    ) -> RemoteResult<Vec<serde_json::Value>> {
        let mut filters = vec![
            ("select", "*".to_string()),
            ("owner_id", format!("eq.{owner_id}")),
        ];
        if let Some(since) = since {
            filters.push(("modified_at", format!("gt.{since}")));
        }

        self.get_all_pages(kind, &filters, "modified_at.asc,id.asc").await
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
    error: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            let message = match payload.hint {
                Some(hint) if !hint.trim().is_empty() => {
                    format!("{} ({})", message.trim(), hint.trim())
                }
                _ => message.trim().to_string(),
            };
            return format!("{message} ({})", status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{trimmed} ({})", status.as_u16())
    }
}

fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    let message = parse_api_error(status, body);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        RemoteError::Unauthorized(message)
    } else {
        RemoteError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

fn map_transport_error(error: &reqwest::Error, timeout: Duration) -> RemoteError {
    if error.is_timeout() {
        RemoteError::Timeout(timeout.as_millis())
    } else {
        RemoteError::Network(error.to_string())
    }
}

fn page_query(
    filters: &[(&'static str, String)],
    order: &str,
    offset: usize,
) -> Vec<(&'static str, String)> {
    let mut query = filters.to_vec();
    query.push(("order", order.to_string()));
    query.push(("limit", PAGE_SIZE.to_string()));
    query.push(("offset", offset.to_string()));
    query
}

/// Parse `start-end/total` (or `*/total` for an empty range).
///
/// Returns the exclusive end of the range and the total when known.
fn parse_content_range(value: &str) -> Option<(usize, Option<usize>)> {
    let (range, total) = value.trim().split_once('/')?;
    let total = match total {
        "*" => None,
        total => Some(total.parse().ok()?),
    };
    let end = match range {
        "*" => 0,
        range => {
            let (_, end) = range.split_once('-')?;
            end.parse::<usize>().ok()? + 1
        }
    };
    Some((end, total))
}

fn is_last_page(range: Option<(usize, Option<usize>)>, fetched: usize, received: usize) -> bool {
    match range {
        Some((end, Some(total))) => end.max(fetched) >= total,
        _ => received < PAGE_SIZE,
    }
}

fn normalize_rest_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.ends_with(REST_PATH) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{REST_PATH}")
    }
}
