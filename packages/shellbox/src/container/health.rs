//! Container health polling.
//!
//! Containers flap while they cold start, so a failed probe is not an error
//! here: the loop just counts it and tries again after a fixed delay. The
//! caller decides what running out of attempts means.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ContainerFetch, HEALTH_PATH};
use crate::error::ContainerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub max_attempts: u32,
    /// Fixed wait between attempts. There is no backoff and no jitter.
    pub delay: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            delay: Duration::from_millis(1000),
        }
    }
}

/// Last health payload reported by a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdd: Option<serde_json::Value>,
    /// Any other fields the container reports, passed through as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Containers are not consistent about the type of `status`; any JSON value
/// is accepted and rendered as text.
fn lenient_status<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HealthSnapshot>,
}

impl HealthOutcome {
    pub fn healthy(data: HealthSnapshot) -> Self {
        Self {
            ok: true,
            data: Some(data),
        }
    }

    pub fn exhausted() -> Self {
        Self {
            ok: false,
            data: None,
        }
    }
}

/// Single request to the container's health endpoint.
pub async fn probe_health<C: ContainerFetch>(container: &C) -> Result<HealthSnapshot, ContainerError> {
    let resp = container.fetch(HEALTH_PATH).await?;
    if !resp.is_success() {
        return Err(ContainerError::UnexpectedStatus(resp.status));
    }
    resp.json()
}

pub async fn await_healthy<C: ContainerFetch>(container: &C, options: &PollOptions) -> HealthOutcome {
    await_healthy_with_progress(container, options, |_, _| {}).await
}

/// Poll until the container reports healthy or `max_attempts` run out.
///
/// `on_progress(attempt, max_attempts)` fires before every request, with
/// `attempt` counting from 1.
pub async fn await_healthy_with_progress<C, F>(
    container: &C,
    options: &PollOptions,
    mut on_progress: F,
) -> HealthOutcome
where
    C: ContainerFetch,
    F: FnMut(u32, u32),
{
    let max = options.max_attempts;
    for attempt in 1..=max {
        on_progress(attempt, max);
        match probe_health(container).await {
            Ok(snapshot) => return HealthOutcome::healthy(snapshot),
            Err(e) => debug!(attempt, max, error = %e, "health probe failed"),
        }
        if attempt < max {
            tokio::time::sleep(options.delay).await;
        }
    }
    HealthOutcome::exhausted()
}
