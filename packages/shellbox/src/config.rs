use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use shellbox_session::BucketName;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::container::{CONTAINER_ID_PLACEHOLDER, PollOptions};

// =============================================================================
// File config (figment-deserialized from defaults / shellbox.toml / env vars)
// =============================================================================
//
//   shellbox.toml:   [containers]
//                    bucket_name = "prod"
//
//   env var:         SHELLBOX_CONTAINERS__BUCKET_NAME=prod   (double underscore = nesting)

pub const DEFAULT_CONFIG_PATH: &str = "shellbox.toml";

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub containers: ContainerFileConfig,
    #[serde(default)]
    pub health: HealthFileConfig,
}

/// Listener settings (lives under `[server]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Container addressing (lives under `[containers]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContainerFileConfig {
    /// Bucket every container in this deployment must be bound to. No default.
    #[serde(default)]
    pub bucket_name: Option<String>,
    /// Base URL of a container; `{container_id}` is substituted per session.
    #[serde(default = "default_endpoint_template")]
    pub endpoint_template: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ContainerFileConfig {
    fn default() -> Self {
        Self {
            bucket_name: None,
            endpoint_template: default_endpoint_template(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Health polling (lives under `[health]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthFileConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for HealthFileConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8787
}
fn default_endpoint_template() -> String {
    format!("http://{CONTAINER_ID_PLACEHOLDER}:8080")
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_max_attempts() -> u32 {
    PollOptions::default().max_attempts
}
fn default_delay_ms() -> u64 {
    PollOptions::default().delay.as_millis() as u64
}

/// Build a figment that layers: defaults → shellbox.toml → SHELLBOX_* env vars.
///
/// A missing config file is not an error; its layer is simply empty.
///
///   `SHELLBOX_SERVER__PORT=9000`  →  `server.port = 9000`
///   `SHELLBOX_HEALTH__DELAY_MS=250`  →  `health.delay_ms = 250`
pub fn load_config(config_path: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SHELLBOX_").split("__"))
}

// =============================================================================
// Runtime config structs (derived from FileConfig)
// =============================================================================

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_file(fc: &ServerFileConfig) -> Self {
        Self {
            host: fc.host.clone(),
            port: fc.port,
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

#[derive(Clone, Debug)]
pub struct ContainerConfig {
    pub bucket: BucketName,
    pub endpoint_template: String,
    pub request_timeout: Duration,
}

impl ContainerConfig {
    pub fn from_file(fc: &ContainerFileConfig) -> Result<Self> {
        let raw = fc
            .bucket_name
            .as_deref()
            .context("containers.bucket_name is not configured (set SHELLBOX_CONTAINERS__BUCKET_NAME)")?;
        let bucket = BucketName::new(raw)
            .with_context(|| format!("containers.bucket_name {raw:?} is not a valid bucket name"))?;

        if !fc.endpoint_template.contains(CONTAINER_ID_PLACEHOLDER) {
            bail!(
                "containers.endpoint_template must contain {CONTAINER_ID_PLACEHOLDER}, got {:?}",
                fc.endpoint_template
            );
        }

        Ok(Self {
            bucket,
            endpoint_template: fc.endpoint_template.clone(),
            request_timeout: Duration::from_secs(fc.request_timeout_secs),
        })
    }
}

impl PollOptions {
    pub fn from_file(fc: &HealthFileConfig) -> Self {
        Self {
            max_attempts: fc.max_attempts,
            delay: Duration::from_millis(fc.delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn containers(bucket: Option<&str>, template: &str) -> ContainerFileConfig {
        ContainerFileConfig {
            bucket_name: bucket.map(str::to_string),
            endpoint_template: template.to_string(),
            request_timeout_secs: 3,
        }
    }

    // ── defaults ────────────────────────────────────────────────────────

    #[test]
    fn test_file_config_defaults() {
        let fc = FileConfig::default();
        assert_eq!(fc.server.host, "127.0.0.1");
        assert_eq!(fc.server.port, 8787);
        assert!(fc.containers.bucket_name.is_none());
        assert!(fc.containers.endpoint_template.contains("{container_id}"));
        assert_eq!(fc.health.max_attempts, 30);
        assert_eq!(fc.health.delay_ms, 1000);
    }

    #[test]
    fn test_poll_options_from_file() {
        let opts = PollOptions::from_file(&HealthFileConfig {
            max_attempts: 5,
            delay_ms: 250,
        });
        assert_eq!(opts.max_attempts, 5);
        assert_eq!(opts.delay, Duration::from_millis(250));
        assert_eq!(
            PollOptions::from_file(&HealthFileConfig::default()),
            PollOptions::default()
        );
    }

    // ── ContainerConfig::from_file ──────────────────────────────────────

    #[test]
    fn test_container_config_requires_bucket() {
        let err = ContainerConfig::from_file(&containers(None, "http://{container_id}"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("bucket_name"));
    }

    #[test]
    fn test_container_config_rejects_bad_bucket() {
        assert!(ContainerConfig::from_file(&containers(Some(""), "http://{container_id}")).is_err());
        assert!(
            ContainerConfig::from_file(&containers(Some("a/b"), "http://{container_id}")).is_err()
        );
    }

    #[test]
    fn test_container_config_requires_placeholder() {
        let err = ContainerConfig::from_file(&containers(Some("prod"), "http://fixed:8080"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("{container_id}"));
    }

    #[test]
    fn test_container_config_valid() {
        let cc = ContainerConfig::from_file(&containers(Some("prod"), "http://{container_id}:80"))
            .unwrap();
        assert_eq!(cc.bucket.as_str(), "prod");
        assert_eq!(cc.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_server_socket_addr() {
        let sc = ServerConfig::from_file(&ServerFileConfig::default());
        assert_eq!(sc.socket_addr().unwrap().port(), 8787);

        let bad = ServerConfig {
            host: "not a host".to_string(),
            port: 1,
        };
        assert!(bad.socket_addr().is_err());
    }

    // ── load_config ─────────────────────────────────────────────────────

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let fc: FileConfig = load_config(Some(tmp.path().join("absent.toml").as_path()))
            .extract()
            .unwrap();
        assert_eq!(fc.health.max_attempts, 30);
        assert_eq!(fc.server.host, "127.0.0.1");
    }

    #[test]
    fn test_load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("shellbox.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9000\n\n[containers]\nbucket_name = \"prod\"\n\n[health]\ndelay_ms = 50\n",
        )
        .unwrap();
        let fc: FileConfig = load_config(Some(path.as_path())).extract().unwrap();
        assert_eq!(fc.server.port, 9000);
        assert_eq!(fc.server.host, "127.0.0.1");
        assert_eq!(fc.containers.bucket_name.as_deref(), Some("prod"));
        assert_eq!(fc.health.delay_ms, 50);
        assert_eq!(fc.health.max_attempts, 30);
    }
}
