//! Remote session store
//!
//! HTTP session service:
//!
//! - `GET    {url}/sessions/{id}` (404 = not found)
//! - `PUT    {url}/sessions/{id}`
//! - `PATCH  {url}/sessions/{id}`
//! - `DELETE {url}/sessions/{id}`
//! - `POST   {url}/sessions/{id}/messages` for mirrored chat-log entries
//!
//! Connection failures and timeouts are retried with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{MirrorEntry, SessionStore, take_mirror};
use crate::constants::session::{REMOTE_MAX_RETRIES, REMOTE_TIMEOUT_SECS};
use crate::types::{DocflowError, Result};

pub struct RemoteSessionStore {
    base: Url,
    token: Option<SecretString>,
    client: reqwest::Client,
}

impl std::fmt::Debug for RemoteSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSessionStore")
            .field("base", &self.base.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl RemoteSessionStore {
    pub fn new(url: &str, token: Option<String>) -> Result<Self> {
        let base = Url::parse(url.trim_end_matches('/'))
            .map_err(|e| DocflowError::Config(format!("Invalid session.remote_url '{}': {}", url, e)))?;
        if base.cannot_be_a_base() {
            return Err(DocflowError::Config(format!(
                "session.remote_url '{}' cannot be used as a base URL",
                url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REMOTE_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            base,
            token: token
                .filter(|t| !t.trim().is_empty())
                .map(SecretString::from),
            client,
        })
    }

    fn url(&self, id: &str, messages: bool) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| DocflowError::Config("session.remote_url cannot be a base".to_string()))?;
            segments.pop_if_empty().push("sessions").push(id);
            if messages {
                segments.push("messages");
            }
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<reqwest::Response> {
        let (method, url) = (&method, &url);
        let attempt = || async move {
            let mut request = self.client.request(method.clone(), url.clone());
            if let Some(token) = &self.token {
                request = request.bearer_auth(token.expose_secret());
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            request.send().await
        };

        attempt
            .retry(ExponentialBuilder::default().with_max_times(REMOTE_MAX_RETRIES))
            .when(|e: &reqwest::Error| e.is_connect() || e.is_timeout())
            .notify(|e: &reqwest::Error, wait: Duration| {
                warn!("Session service request failed, retrying in {:?}: {}", wait, e)
            })
            .await
            .map_err(DocflowError::from)
    }

    async fn expect_success(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DocflowError::Storage(format!(
            "Session service {} failed ({}): {}",
            action, status, body
        )))
    }

    async fn mirror(&self, id: &str, entry: &MirrorEntry) -> Result<()> {
        let body = serde_json::to_value(entry)?;
        let response = self
            .send(Method::POST, self.url(id, true)?, Some(&body))
            .await?;
        Self::expect_success(response, "mirror").await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RemoteSessionStore {
    async fn get(&self, id: &str) -> Result<Option<Value>> {
        let response = self.send(Method::GET, self.url(id, false)?, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::expect_success(response, "get").await?;
        Ok(Some(response.json().await?))
    }

    async fn set(&self, id: &str, value: Value) -> Result<()> {
        let response = self
            .send(Method::PUT, self.url(id, false)?, Some(&value))
            .await?;
        Self::expect_success(response, "set").await?;
        Ok(())
    }

    async fn update(&self, id: &str, patch: Value) -> Result<()> {
        let (fields, mirror) = take_mirror(patch);
        if !fields.is_empty() {
            let body = Value::Object(fields);
            let response = self
                .send(Method::PATCH, self.url(id, false)?, Some(&body))
                .await?;
            Self::expect_success(response, "update").await?;
        }
        if let Some(entry) = mirror {
            self.mirror(id, &entry).await?;
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let response = self.send(Method::DELETE, self.url(id, false)?, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::expect_success(response, "delete").await?;
        debug!("Deleted remote session {}", id);
        Ok(true)
    }

    fn supports_mirroring(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Read one request: headers, then `Content-Length` bytes of body
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).into_owned();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    /// Serves canned responses in order, recording each request
    async fn serve(responses: Vec<&'static str>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        tokio::spawn(async move {
            for response in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                log.lock().unwrap().push(request);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{}/api", addr), seen)
    }

    #[test]
    fn test_urls() {
        let store = RemoteSessionStore::new("https://example.com/api/", Some("t".into())).unwrap();
        assert_eq!(
            store.url("abc", false).unwrap().as_str(),
            "https://example.com/api/sessions/abc"
        );
        assert_eq!(
            store.url("abc", true).unwrap().as_str(),
            "https://example.com/api/sessions/abc/messages"
        );
        // Ids are percent-encoded path segments
        assert_eq!(
            store.url("a/b", false).unwrap().as_str(),
            "https://example.com/api/sessions/a%2Fb"
        );
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        assert!(matches!(
            RemoteSessionStore::new("not a url", None),
            Err(DocflowError::Config(_))
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let store = RemoteSessionStore::new("https://example.com", Some("secret-token".into())).unwrap();
        assert!(!format!("{:?}", store).contains("secret-token"));
    }

    #[tokio::test]
    async fn test_get_not_found_is_none() {
        let (url, seen) = serve(vec![
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ])
        .await;
        let store = RemoteSessionStore::new(&url, Some("tok".into())).unwrap();
        assert_eq!(store.get("s1").await.unwrap(), None);

        let request = seen.lock().unwrap()[0].clone();
        assert!(request.starts_with("GET /api/sessions/s1 "));
        assert!(request.to_lowercase().contains("authorization: bearer tok"));
    }

    #[tokio::test]
    async fn test_get_returns_document() {
        let (url, _) = serve(vec![
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 17\r\nConnection: close\r\n\r\n{\"sessionId\":\"s\"}",
        ])
        .await;
        let store = RemoteSessionStore::new(&url, None).unwrap();
        assert_eq!(store.get("s").await.unwrap(), Some(json!({"sessionId": "s"})));
    }

    #[tokio::test]
    async fn test_update_patches_then_mirrors() {
        let ok = "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        let (url, seen) = serve(vec![ok, ok]).await;
        let store = RemoteSessionStore::new(&url, None).unwrap();

        store
            .update(
                "s2",
                json!({"turns": [], "_mirror": {"role": "user", "content": "hi", "kind": "turn", "timestamp": "t"}}),
            )
            .await
            .unwrap();

        let requests = seen.lock().unwrap().clone();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("PATCH /api/sessions/s2 "));
        assert!(!requests[0].contains("_mirror"));
        assert!(requests[1].starts_with("POST /api/sessions/s2/messages "));
        assert!(requests[1].contains("\"kind\":\"turn\""));
    }

    #[tokio::test]
    async fn test_server_error_is_storage_error() {
        let (url, _) = serve(vec![
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\nConnection: close\r\n\r\nboom",
        ])
        .await;
        let store = RemoteSessionStore::new(&url, None).unwrap();
        let err = store.set("s3", json!({})).await.unwrap_err();
        assert!(matches!(err, DocflowError::Storage(msg) if msg.contains("boom")));
    }
}
