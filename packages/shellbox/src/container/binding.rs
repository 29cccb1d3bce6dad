//! Storage binding check.
//!
//! A container reports the bucket it mounted at `/bucket-name`. Handing a
//! terminal to a container bound to some other bucket would expose the wrong
//! user's files, so any disagreement is fatal for the connection.

use serde::Deserialize;
use shellbox_session::BucketName;
use tracing::warn;

use super::{BUCKET_NAME_PATH, ContainerFetch};
use crate::error::{BucketMismatchError, ContainerError, ReconcileError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketNameBody {
    #[serde(default)]
    bucket_name: Option<String>,
}

/// Confirm the container is bound to `expected`. Makes exactly one request.
pub async fn ensure_bucket_binding<C: ContainerFetch>(
    container: &C,
    expected: &BucketName,
) -> Result<(), ReconcileError> {
    let resp = match container.fetch(BUCKET_NAME_PATH).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(error = %e, "bucket name request failed");
            return Err(ContainerError::BucketNameUnavailable.into());
        }
    };
    if !resp.is_success() {
        warn!(status = resp.status, "bucket name request rejected");
        return Err(ContainerError::BucketNameUnavailable.into());
    }
    let body: BucketNameBody = resp
        .json()
        .map_err(|_| ContainerError::BucketNameUnavailable)?;

    match body.bucket_name {
        Some(actual) if actual == expected.as_str() => Ok(()),
        actual => Err(BucketMismatchError {
            expected: expected.as_str().to_string(),
            actual,
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::FetchResponse;
    use crate::container::testing::ScriptedContainer;

    fn bucket(name: &str) -> BucketName {
        BucketName::new(name).unwrap()
    }

    #[tokio::test]
    async fn matching_bucket_passes() {
        let container =
            ScriptedContainer::new(vec![Ok(FetchResponse::new(200, r#"{"bucketName":"prod"}"#))]);
        ensure_bucket_binding(&container, &bucket("prod")).await.unwrap();
        assert_eq!(container.paths(), vec!["/bucket-name".to_string()]);
    }

    #[tokio::test]
    async fn mismatch_names_both_buckets() {
        let container = ScriptedContainer::new(vec![Ok(FetchResponse::new(
            200,
            r#"{"bucketName":"staging"}"#,
        ))]);
        let err = ensure_bucket_binding(&container, &bucket("prod"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::BucketMismatch(_)));
        let msg = err.to_string();
        assert!(msg.contains("prod"));
        assert!(msg.contains("staging"));
        assert!(!err.retryable());
    }

    #[tokio::test]
    async fn null_bucket_is_mismatch() {
        let container =
            ScriptedContainer::new(vec![Ok(FetchResponse::new(200, r#"{"bucketName":null}"#))]);
        let err = ensure_bucket_binding(&container, &bucket("prod"))
            .await
            .unwrap_err();
        match err {
            ReconcileError::BucketMismatch(m) => assert_eq!(m.actual, None),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_field_is_mismatch() {
        let container = ScriptedContainer::new(vec![Ok(FetchResponse::new(200, "{}"))]);
        let err = ensure_bucket_binding(&container, &bucket("prod"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "bucket_mismatch");
    }

    #[tokio::test]
    async fn error_status_gives_fixed_message_without_retry() {
        let container = ScriptedContainer::new(vec![
            Ok(FetchResponse::new(500, "internal: /var/secret/path")),
            Ok(FetchResponse::new(200, r#"{"bucketName":"prod"}"#)),
        ]);
        let err = ensure_bucket_binding(&container, &bucket("prod"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to get container bucket name");
        assert!(matches!(
            err,
            ReconcileError::Container(ContainerError::BucketNameUnavailable)
        ));
        assert_eq!(container.calls(), 1);
    }

    #[tokio::test]
    async fn transport_failure_is_unavailable() {
        let container = ScriptedContainer::new(vec![Err(())]);
        let err = ensure_bucket_binding(&container, &bucket("prod"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to get container bucket name");
        assert!(err.retryable());
    }

    #[tokio::test]
    async fn garbage_body_is_unavailable() {
        let container = ScriptedContainer::new(vec![Ok(FetchResponse::new(200, "prod"))]);
        let err = ensure_bucket_binding(&container, &bucket("prod"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "container_unavailable");
    }
}
