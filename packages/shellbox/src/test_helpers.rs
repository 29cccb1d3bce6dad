use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use shellbox_session::BucketName;

use crate::AppState;
use crate::container::{ContainerDirectory, PollOptions};
use crate::metrics::ServerMetrics;

/// How the fake container answers its two endpoints.
#[derive(Clone)]
pub struct FakeContainer {
    /// Health requests answered with 503 before the first 200.
    pub unhealthy_for: usize,
    /// Value of `bucketName`; `None` reports `null`.
    pub bucket_name: Option<String>,
    /// Status for `/bucket-name`.
    pub bucket_status: StatusCode,
    pub health_calls: Arc<AtomicUsize>,
    pub bucket_calls: Arc<AtomicUsize>,
}

impl FakeContainer {
    pub fn healthy(bucket: &str) -> Self {
        Self {
            unhealthy_for: 0,
            bucket_name: Some(bucket.to_string()),
            bucket_status: StatusCode::OK,
            health_calls: Arc::new(AtomicUsize::new(0)),
            bucket_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn bucket_calls(&self) -> usize {
        self.bucket_calls.load(Ordering::SeqCst)
    }
}

async fn fake_health(State(fake): State<FakeContainer>) -> impl IntoResponse {
    let n = fake.health_calls.fetch_add(1, Ordering::SeqCst);
    if n < fake.unhealthy_for {
        return (StatusCode::SERVICE_UNAVAILABLE, "starting").into_response();
    }
    Json(serde_json::json!({ "status": "ok", "cpu": 0.1, "mem": 0.5, "hdd": 0.2 })).into_response()
}

async fn fake_bucket_name(State(fake): State<FakeContainer>) -> impl IntoResponse {
    fake.bucket_calls.fetch_add(1, Ordering::SeqCst);
    if !fake.bucket_status.is_success() {
        return (fake.bucket_status, "bucket lookup exploded at /srv/secret").into_response();
    }
    Json(serde_json::json!({ "bucketName": fake.bucket_name })).into_response()
}

/// Serve `fake` on an ephemeral port. Every container id maps to the same
/// server under `/<container_id>/...`.
pub async fn spawn_fake_container(fake: FakeContainer) -> SocketAddr {
    let app = Router::new()
        .route("/{container_id}/health", get(fake_health))
        .route("/{container_id}/bucket-name", get(fake_bucket_name))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake container");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake container");
    });
    addr
}

/// `AppState` pointing at a fake container, bucket `prod`, fast polling.
pub fn test_app_state(container_addr: SocketAddr, max_attempts: u32) -> AppState {
    let containers = ContainerDirectory::new(
        BucketName::new("prod").expect("bucket"),
        format!("http://{container_addr}/{{container_id}}"),
        Duration::from_secs(5),
    )
    .expect("directory");

    AppState {
        containers: Arc::new(containers),
        poll: PollOptions {
            max_attempts,
            delay: Duration::from_millis(10),
        },
        metrics: Arc::new(ServerMetrics::new()),
    }
}
