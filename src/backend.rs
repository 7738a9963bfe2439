use crate::config::Settings;
use crate::error::BotError;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Body of `GET /meta/status.json`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct BackendStatus {
    /// True while the backend is saving its brain.
    #[serde(rename = "status")]
    pub busy: bool,
}

/// Learn/reply operations served by the generation backend.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn submit_learning(&self, text: &str) -> Result<(), BotError>;
    async fn request_reply(&self, text: &str) -> Result<String, BotError>;
    async fn poll_status(&self) -> Result<BackendStatus, BotError>;
}

/// HTTP client for a multiplexing backend.
pub struct ReplyProxyClient {
    http: reqwest::Client,
    base_url: String,
    multiplexing: bool,
    closed: AtomicBool,
}

impl ReplyProxyClient {
    pub fn new(settings: &Settings) -> Self {
        Self::with_base_url(settings.backend_base_url(), settings.pyborg.multiplex)
    }

    pub fn with_base_url(base_url: impl Into<String>, multiplexing: bool) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
            multiplexing,
            closed: AtomicBool::new(false),
        }
    }

    /// The shared connection pool, for other callers of the same backend.
    pub fn http_client(&self) -> reqwest::Client {
        self.http.clone()
    }

    /// Stop accepting calls. Idle pooled connections are released once the
    /// last clone of the client is dropped.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Closed backend client for {}", self.base_url);
        }
    }

    fn endpoint(&self, path: &str) -> Result<String, BotError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BotError::BackendClosed);
        }
        if !self.multiplexing {
            return Err(BotError::UnsupportedMode);
        }
        Ok(format!("{}{}", self.base_url, path))
    }
}

#[async_trait]
impl Backend for ReplyProxyClient {
    async fn submit_learning(&self, text: &str) -> Result<(), BotError> {
        let url = self.endpoint("learn")?;
        self.http
            .post(url)
            .form(&[("body", text)])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn request_reply(&self, text: &str) -> Result<String, BotError> {
        let url = self.endpoint("reply")?;
        let reply = self
            .http
            .post(url)
            .form(&[("body", text)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!("got reply: {}", reply);
        Ok(reply)
    }

    async fn poll_status(&self) -> Result<BackendStatus, BotError> {
        let url = self.endpoint("meta/status.json")?;
        let status = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<BackendStatus>()
            .await?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn learn_posts_form_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/learn"))
            .and(body_string("body=hello+there"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = ReplyProxyClient::with_base_url(server.uri(), true);
        client.submit_learning("hello there").await.unwrap();
    }

    #[tokio::test]
    async fn reply_returns_body_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reply"))
            .and(body_string("body=how+are+you"))
            .respond_with(ResponseTemplate::new(200).set_body_string("just fine"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ReplyProxyClient::with_base_url(format!("{}/", server.uri()), true);
        let reply = client.request_reply("how are you").await.unwrap();
        assert_eq!(reply, "just fine");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reply"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = ReplyProxyClient::with_base_url(server.uri(), true);
        let result = client.request_reply("anything").await;
        assert!(matches!(result, Err(BotError::Backend(_))));
    }

    #[tokio::test]
    async fn status_reports_busy_flag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meta/status.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": true })),
            )
            .mount(&server)
            .await;

        let client = ReplyProxyClient::with_base_url(server.uri(), true);
        let status = client.poll_status().await.unwrap();
        assert!(status.busy);
    }

    #[tokio::test]
    async fn standalone_mode_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ReplyProxyClient::with_base_url(server.uri(), false);
        assert!(matches!(
            client.submit_learning("hi").await,
            Err(BotError::UnsupportedMode)
        ));
        assert!(matches!(
            client.request_reply("hi").await,
            Err(BotError::UnsupportedMode)
        ));
    }

    #[tokio::test]
    async fn closed_client_rejects_calls() {
        let client = ReplyProxyClient::with_base_url("http://127.0.0.1:9/", true);
        client.close();
        assert!(matches!(
            client.poll_status().await,
            Err(BotError::BackendClosed)
        ));
    }
}
