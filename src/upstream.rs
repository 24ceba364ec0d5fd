//! HTTP client for calls to neighbouring services.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

/// Error from an upstream call.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid upstream url '{0}'")]
    InvalidUrl(String),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: StatusCode },
    #[error("unreadable response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl UpstreamError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, UpstreamError::Transport { source, .. } if source.is_timeout())
    }
}

/// Client bound to one service's base URL. Every request carries the
/// timeout configured at construction.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: Url,
}

impl UpstreamClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|_| UpstreamError::InvalidUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(UpstreamError::InvalidUrl(base_url.to_string()).into());
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET a JSON document. Anything but a 2xx is an error.
    pub async fn get_json(&self, segments: &[&str]) -> Result<Value, UpstreamError> {
        let url = self.url(segments)?;
        tracing::debug!(url = %url, "upstream request");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                url: url.to_string(),
                status,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|source| UpstreamError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Json, Router};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn segments_are_encoded() {
        let client = UpstreamClient::new("http://books:3001/", Duration::from_secs(1)).unwrap();
        let url = client.url(&["books", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://books:3001/books/a%20b%2Fc");
    }

    #[test]
    fn rejects_unparseable_base() {
        assert!(UpstreamClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn maps_status_and_timeout() {
        let base = serve(
            Router::new()
                .route("/ok", get(|| async { Json(serde_json::json!({"ok": true})) }))
                .route(
                    "/slow",
                    get(|| async {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        "late"
                    }),
                ),
        )
        .await;
        let client = UpstreamClient::new(&base, Duration::from_millis(100)).unwrap();

        assert_eq!(client.get_json(&["ok"]).await.unwrap()["ok"], true);
        assert!(client.get_json(&["missing"]).await.unwrap_err().is_not_found());
        assert!(client.get_json(&["slow"]).await.unwrap_err().is_timeout());
    }
}
