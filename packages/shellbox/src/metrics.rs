//! Server metrics for observability
//!
//! Counters for the terminal gate and the stream proxy behind it.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently proxied terminal streams
    pub active_connections: AtomicU64,
    /// Total terminal streams since server start
    pub total_connections: AtomicU64,

    // Gate metrics
    /// Terminal upgrades refused for a malformed route
    pub route_rejections: AtomicU64,
    /// Containers that reported healthy within the attempt budget
    pub health_ready: AtomicU64,
    /// Containers that never reported healthy
    pub health_exhausted: AtomicU64,
    /// Containers bound to the wrong bucket
    pub bucket_mismatches: AtomicU64,
    /// Bucket lookups that failed outright
    pub container_errors: AtomicU64,

    // Stream metrics
    /// Frames forwarded from clients to containers
    pub frames_upstream: AtomicU64,
    /// Frames forwarded from containers to clients
    pub frames_downstream: AtomicU64,
    /// Proxy connections that failed or ended in error
    pub proxy_errors: AtomicU64,

    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    // Gate tracking
    pub fn route_rejected(&self) {
        self.route_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn health_ready(&self) {
        self.health_ready.fetch_add(1, Ordering::Relaxed);
    }

    pub fn health_exhausted(&self) {
        self.health_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bucket_mismatch(&self) {
        self.bucket_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn container_error(&self) {
        self.container_errors.fetch_add(1, Ordering::Relaxed);
    }

    // Stream tracking
    pub fn frame_upstream(&self) {
        self.frames_upstream.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_downstream(&self) {
        self.frames_downstream.fetch_add(1, Ordering::Relaxed);
    }

    pub fn proxy_error(&self) {
        self.proxy_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            gate: GateMetrics {
                route_rejections: self.route_rejections.load(Ordering::Relaxed),
                health_ready: self.health_ready.load(Ordering::Relaxed),
                health_exhausted: self.health_exhausted.load(Ordering::Relaxed),
                bucket_mismatches: self.bucket_mismatches.load(Ordering::Relaxed),
                container_errors: self.container_errors.load(Ordering::Relaxed),
            },
            frames: FrameMetrics {
                upstream: self.frames_upstream.load(Ordering::Relaxed),
                downstream: self.frames_downstream.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                proxy: self.proxy_errors.load(Ordering::Relaxed),
                bucket_mismatch: self.bucket_mismatches.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub gate: GateMetrics,
    pub frames: FrameMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateMetrics {
    pub route_rejections: u64,
    pub health_ready: u64,
    pub health_exhausted: u64,
    pub bucket_mismatches: u64,
    pub container_errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub upstream: u64,
    pub downstream: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub proxy: u64,
    pub bucket_mismatch: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub bucket: String,
    pub connections: u64,
    pub uptime_secs: u64,
}
