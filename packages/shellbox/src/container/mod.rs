//! Container addressing and the fetch surface the gate talks to.
//!
//! A container is a black box reachable over HTTP. The reconciler only needs
//! [`ContainerFetch`]; [`HttpContainer`] is the production implementation and
//! tests substitute scripted fakes.

pub mod binding;
pub mod health;

use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use shellbox_session::{BucketName, ContainerId, SessionId, TerminalId, derive_container_id};

use crate::error::ContainerError;

pub use binding::ensure_bucket_binding;
pub use health::{
    HealthOutcome, HealthSnapshot, PollOptions, await_healthy, await_healthy_with_progress,
};

pub const HEALTH_PATH: &str = "/health";
pub const BUCKET_NAME_PATH: &str = "/bucket-name";
pub const TERMINAL_STREAM_PATH: &str = "/ws";

/// Placeholder substituted with the container id in an endpoint template.
pub const CONTAINER_ID_PLACEHOLDER: &str = "{container_id}";

/// Status and body of a completed container request.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ContainerError> {
        serde_json::from_slice(&self.body).map_err(|_| ContainerError::InvalidBody)
    }
}

/// Issue a GET against one of the container's endpoints.
///
/// `Err` means the request never completed; any HTTP status, including
/// failures, comes back as `Ok`.
pub trait ContainerFetch: Send + Sync {
    fn fetch(&self, path: &str) -> impl Future<Output = Result<FetchResponse, ContainerError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpContainer {
    id: ContainerId,
    base_url: String,
    client: reqwest::Client,
}

impl HttpContainer {
    pub fn new(id: ContainerId, base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            id,
            base_url,
            client,
        }
    }

    pub fn id(&self) -> &ContainerId {
        &self.id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// WebSocket URL of the terminal stream for one tab.
    pub fn terminal_url(&self, terminal: TerminalId) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}{TERMINAL_STREAM_PATH}?terminal={terminal}")
    }
}

impl ContainerFetch for HttpContainer {
    async fn fetch(&self, path: &str) -> Result<FetchResponse, ContainerError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ContainerError::transport)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(ContainerError::transport)?;
        Ok(FetchResponse { status, body })
    }
}

/// Maps sessions onto their containers for one configured bucket.
#[derive(Debug, Clone)]
pub struct ContainerDirectory {
    bucket: BucketName,
    endpoint_template: String,
    client: reqwest::Client,
}

impl ContainerDirectory {
    pub fn new(
        bucket: BucketName,
        endpoint_template: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            bucket,
            endpoint_template: endpoint_template.into(),
            client,
        })
    }

    pub fn bucket(&self) -> &BucketName {
        &self.bucket
    }

    pub fn resolve(&self, session: &SessionId) -> HttpContainer {
        let id = derive_container_id(&self.bucket, session);
        let base_url = self
            .endpoint_template
            .replace(CONTAINER_ID_PLACEHOLDER, id.as_str());
        HttpContainer::new(id, base_url, self.client.clone())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use shellbox_session::validate_session_id;

    fn directory(template: &str) -> ContainerDirectory {
        ContainerDirectory::new(
            BucketName::new("mybucket").unwrap(),
            template,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn resolve_substitutes_container_id() {
        let dir = directory("http://{container_id}.containers.internal:8080/");
        let session = validate_session_id(Some("abc12345")).unwrap();
        let container = dir.resolve(&session);
        assert_eq!(container.id().as_str(), "mybucket-abc12345");
        assert_eq!(
            container.base_url(),
            "http://mybucket-abc12345.containers.internal:8080"
        );
    }

    #[test]
    fn terminal_url_switches_scheme() {
        let dir = directory("https://edge.example/c/{container_id}");
        let session = validate_session_id(Some("abc12345")).unwrap();
        let container = dir.resolve(&session);
        assert_eq!(
            container.terminal_url(TerminalId::new(4).unwrap()),
            "wss://edge.example/c/mybucket-abc12345/ws?terminal=4"
        );

        let plain = directory("http://127.0.0.1:9000/{container_id}").resolve(&session);
        assert_eq!(
            plain.terminal_url(TerminalId::PRIMARY),
            "ws://127.0.0.1:9000/mybucket-abc12345/ws?terminal=1"
        );
    }

    #[test]
    fn fetch_response_success_range() {
        assert!(FetchResponse::new(200, "").is_success());
        assert!(FetchResponse::new(204, "").is_success());
        assert!(!FetchResponse::new(302, "").is_success());
        assert!(!FetchResponse::new(503, "").is_success());
    }

    #[tokio::test]
    async fn fetch_unreachable_is_transport_error() {
        let container = HttpContainer::new(
            validate_session_id(Some("abc12345"))
                .map(|s| derive_container_id(&BucketName::new("b").unwrap(), &s))
                .unwrap(),
            "http://127.0.0.1:1",
            reqwest::Client::new(),
        );
        let err = container.fetch(HEALTH_PATH).await.unwrap_err();
        assert!(matches!(err, ContainerError::Transport(_)));
    }
}
