//! REST client for the ScriptStudio entity API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{RemoteApi, RemoteError, RemoteResult};
use crate::models::{Collection, Record, RecordId, SortSpec};
use crate::util::{compact_text, is_http_url, normalize_text_option, now_millis};

/// HTTP client for `{base}/entities/{collection}[/{id}]` endpoints.
#[derive(Clone)]
pub struct HttpRemoteApi {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteApi {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteApi")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpRemoteApi {
    /// Builds a client for an explicit API base URL.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            token: normalize_text_option(token),
            client: reqwest::Client::builder().build()?,
        })
    }

    /// Returns the base URL this client was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the API host answers at all within `limit`.
    ///
    /// Any HTTP response counts as reachable; only transport failures and
    /// timeouts do not.
    pub async fn probe(&self, limit: Duration) -> bool {
        let request = self.request(Method::GET, self.base_url.clone()).send();
        match tokio::time::timeout(limit, request).await {
            Ok(Ok(_)) => true,
            Ok(Err(error)) => {
                tracing::debug!("API probe failed: {error}");
                false
            }
            Err(_) => {
                tracing::debug!("API probe timed out after {limit:?}");
                false
            }
        }
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/entities/{}", self.base_url, collection)
    }

    fn record_url(&self, collection: Collection, id: &RecordId) -> String {
        format!(
            "{}/{}",
            self.collection_url(collection),
            urlencoding::encode(id.as_str())
        )
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    async fn send_record(&self, request: RequestBuilder) -> RemoteResult<Record> {
        let payload = self.send(request).await?.json::<Value>().await?;
        parse_record(payload)
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn list(&self, collection: Collection, sort: &SortSpec) -> RemoteResult<Vec<Record>> {
        let request = self
            .request(Method::GET, self.collection_url(collection))
            .query(&[("sort", sort.to_string())]);
        let payload = self.send(request).await?.json::<Value>().await?;

        let items = match payload {
            Value::Array(items) => items,
            other => {
                return Err(RemoteError::InvalidPayload(format!(
                    "expected a JSON array of records, got {}",
                    compact_text(&other.to_string())
                )))
            }
        };
        items.into_iter().map(parse_record).collect()
    }

    async fn get(&self, collection: Collection, id: &RecordId) -> RemoteResult<Record> {
        self.send_record(self.request(Method::GET, self.record_url(collection, id)))
            .await
    }

    async fn create(&self, collection: Collection, payload: &Value) -> RemoteResult<Record> {
        self.send_record(
            self.request(Method::POST, self.collection_url(collection))
                .json(payload),
        )
        .await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        partial: &Value,
    ) -> RemoteResult<Record> {
        self.send_record(
            self.request(Method::PATCH, self.record_url(collection, id))
                .json(partial),
        )
        .await
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> RemoteResult<()> {
        self.send(self.request(Method::DELETE, self.record_url(collection, id)))
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn status_error(status: StatusCode, body: &str) -> RemoteError {
    match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound,
        StatusCode::CONFLICT => RemoteError::Conflict,
        _ => RemoteError::Api {
            status: status.as_u16(),
            message: parse_api_error(status, body),
        },
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed
    }
}

fn parse_record(payload: Value) -> RemoteResult<Record> {
    let preview = compact_text(&payload.to_string());
    Record::from_remote(payload, now_millis())
        .ok_or_else(|| RemoteError::InvalidPayload(format!("record without id: {preview}")))
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| RemoteError::Unavailable("API base URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::Unavailable(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("api.example.com".to_string()).is_err());
        assert_eq!(
            normalize_base_url(" https://api.example.com/v1/ ".to_string()).unwrap(),
            "https://api.example.com/v1"
        );
    }

    #[test]
    fn record_urls_escape_ids() {
        let api = HttpRemoteApi::new("https://api.example.com", None).unwrap();
        let id = RecordId::parse("a b/c").unwrap();
        assert_eq!(
            api.record_url(Collection::Notes, &id),
            "https://api.example.com/entities/notes/a%20b%2Fc"
        );
    }

    #[test]
    fn status_errors_map_not_found_and_conflict() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, ""),
            RemoteError::NotFound
        ));
        assert!(matches!(
            status_error(StatusCode::CONFLICT, "{}"),
            RemoteError::Conflict
        ));
    }

    #[test]
    fn api_error_prefers_message_field() {
        let error = status_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"message": "database unavailable"}"#,
        );
        assert_eq!(
            error.to_string(),
            "Remote API error: database unavailable (500)"
        );

        let empty = status_error(StatusCode::BAD_GATEWAY, "   ");
        assert_eq!(empty.to_string(), "Remote API error: HTTP 502 (502)");
    }

    #[test]
    fn debug_redacts_token() {
        let api = HttpRemoteApi::new("https://api.example.com", Some("secret".into())).unwrap();
        let debug = format!("{api:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn parse_record_requires_id() {
        assert!(parse_record(json!({"title": "x"})).is_err());
        assert_eq!(
            parse_record(json!({"id": "n1"})).unwrap().id.as_str(),
            "n1"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn probe_reports_unreachable_host() {
        // Port 9 (discard) on localhost is closed in test environments
        let api = HttpRemoteApi::new("http://127.0.0.1:9", None).unwrap();
        assert!(!api.probe(Duration::from_millis(500)).await);
    }
}
