//! Long-running operation tracking.
//!
//! Azure DevOps answers some mutations with an operation reference
//! instead of a result; the caller polls until the operation settles.
//! This module provides:
//! - [`OperationReference`] / [`OperationStatus`] / [`OperationResult`]
//! - [`OperationsClient`] - The polling seam, mockable in tests
//! - [`wait_for_operation`] - The 1-second poll loop with settle delay
//! - [`OperationsApi`] - The trait implemented over [`RestClient`]
//!
//! The waiter never retries transport failures; a poll that cannot
//! reach the service fails the wait immediately.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::client::RestClient;
use crate::error::RuntimeError;

/// Poll cadence.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Delay after a `Succeeded` report before the wait returns, giving
/// eventually-consistent read paths time to observe the result.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// API version of the operations area.
const OPERATIONS_API_VERSION: &str = "7.0";

/// Identity of a tracked operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationReference {
    pub id: Uuid,
    #[serde(default)]
    pub plugin_id: Option<Uuid>,
}

/// Lifecycle states an operation reports.
///
/// `NotSet` is returned by some hosts before the operation is queued;
/// it is pending, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationStatus {
    NotSet,
    Queued,
    InProgress,
    Succeeded,
    Failed,
    Cancelled,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotSet => "notSet",
            Self::Queued => "queued",
            Self::InProgress => "inProgress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// One poll's view of an operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub status: OperationStatus,
    #[serde(default)]
    pub detailed_message: Option<String>,
}

/// The polling seam of the waiter.
#[async_trait]
pub trait OperationsClient: Send + Sync {
    /// Fetch the current state of an operation.
    async fn get_operation(
        &self,
        reference: &OperationReference,
        cancel: &CancellationToken,
    ) -> Result<OperationResult, RuntimeError>;
}

/// Poll an operation until it settles or the deadline elapses.
///
/// Polls every second; a `Succeeded` report is followed by a short
/// settle delay before the wait returns. `Failed` and `Cancelled`
/// reports fail the wait carrying the operation id, status, and
/// whatever detail the service offered.
pub async fn wait_for_operation(
    client: &dyn OperationsClient,
    reference: &OperationReference,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<(), RuntimeError> {
    let timeout = tokio::time::sleep(deadline);
    tokio::pin!(timeout);

    // The first poll waits a full interval; mutations are never
    // observable the instant the operation reference is handed out.
    let start = tokio::time::Instant::now() + POLL_INTERVAL;
    let mut ticker = tokio::time::interval_at(start, POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
            _ = &mut timeout => {
                return Err(RuntimeError::Timeout {
                    operation: format!("wait for operation {}", reference.id),
                    after: deadline,
                });
            }
            _ = ticker.tick() => {
                let result = client.get_operation(reference, cancel).await?;
                debug!(operation = %reference.id, status = %result.status, "Polled operation");
                match result.status {
                    OperationStatus::Succeeded => {
                        tokio::select! {
                            _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
                            _ = tokio::time::sleep(SETTLE_DELAY) => return Ok(()),
                        }
                    }
                    OperationStatus::Failed | OperationStatus::Cancelled => {
                        return Err(RuntimeError::OperationFailed {
                            id: reference.id,
                            status: result.status,
                            message: result
                                .detailed_message
                                .unwrap_or_else(|| "no detail provided".to_string()),
                        });
                    }
                    OperationStatus::NotSet
                    | OperationStatus::Queued
                    | OperationStatus::InProgress => {}
                }
            }
        }
    }
}

/// [`OperationsClient`] over the live REST surface.
pub struct OperationsApi {
    rest: Arc<RestClient>,
}

impl OperationsApi {
    pub fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl OperationsClient for OperationsApi {
    async fn get_operation(
        &self,
        reference: &OperationReference,
        cancel: &CancellationToken,
    ) -> Result<OperationResult, RuntimeError> {
        let url = self
            .rest
            .api_url(None, &format!("operations/{}", reference.id));
        let plugin_id = reference.plugin_id.map(|id| id.to_string());
        let mut query = vec![("api-version", OPERATIONS_API_VERSION)];
        if let Some(plugin_id) = plugin_id.as_deref() {
            query.push(("pluginId", plugin_id));
        }
        self.rest.get_json(&url, &query, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedClient {
        script: Mutex<Vec<Result<OperationResult, RuntimeError>>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Result<OperationResult, RuntimeError>>) -> Self {
            Self {
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl OperationsClient for ScriptedClient {
        async fn get_operation(
            &self,
            _reference: &OperationReference,
            _cancel: &CancellationToken,
        ) -> Result<OperationResult, RuntimeError> {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                // Past the end of the script the operation stays pending.
                return Ok(OperationResult {
                    status: OperationStatus::InProgress,
                    detailed_message: None,
                });
            }
            script.remove(0)
        }
    }

    fn pending(status: OperationStatus) -> Result<OperationResult, RuntimeError> {
        Ok(OperationResult {
            status,
            detailed_message: None,
        })
    }

    fn reference() -> OperationReference {
        OperationReference {
            id: Uuid::new_v4(),
            plugin_id: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_succeeds_after_settle_delay() {
        let client = ScriptedClient::new(vec![
            pending(OperationStatus::NotSet),
            pending(OperationStatus::Queued),
            pending(OperationStatus::InProgress),
            pending(OperationStatus::Succeeded),
        ]);

        let started = tokio::time::Instant::now();
        wait_for_operation(
            &client,
            &reference(),
            Duration::from_secs(30),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        // Four polls at 1s spacing (the first after a full interval)
        // plus the 2s settle delay.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(8), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success_still_waits_poll_plus_settle() {
        let client = ScriptedClient::new(vec![pending(OperationStatus::Succeeded)]);

        let started = tokio::time::Instant::now();
        wait_for_operation(
            &client,
            &reference(),
            Duration::from_secs(30),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        // One 1s poll interval plus the 2s settle delay.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(4), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_on_pending_operation() {
        let client = ScriptedClient::new(vec![]);

        let err = wait_for_operation(
            &client,
            &reference(),
            Duration::from_secs(10),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Timeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_operation_carries_detail() {
        let client = ScriptedClient::new(vec![Ok(OperationResult {
            status: OperationStatus::Failed,
            detailed_message: Some("project name already in use".to_string()),
        })]);

        let reference = reference();
        let err = wait_for_operation(
            &client,
            &reference,
            Duration::from_secs(30),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        match err {
            RuntimeError::OperationFailed { id, status, message } => {
                assert_eq!(id, reference.id);
                assert_eq!(status, OperationStatus::Failed);
                assert!(message.contains("already in use"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_fails_without_retry() {
        let client = ScriptedClient::new(vec![
            Err(RuntimeError::Transport {
                message: "connection refused".to_string(),
            }),
            pending(OperationStatus::Succeeded),
        ]);

        let err = wait_for_operation(
            &client,
            &reference(),
            Duration::from_secs(30),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Transport { .. }));
        // The Succeeded entry was never consumed.
        assert_eq!(client.script.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_wins_over_pending_polls() {
        let client = ScriptedClient::new(vec![]);
        let cancel = CancellationToken::new();

        let child = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            child.cancel();
        });

        let err = wait_for_operation(
            &client,
            &reference(),
            Duration::from_secs(30),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Cancelled));
    }

    #[test]
    fn test_status_parses_camel_case() {
        let result: OperationResult =
            serde_json::from_str(r#"{"status":"inProgress"}"#).unwrap();
        assert_eq!(result.status, OperationStatus::InProgress);

        let result: OperationResult = serde_json::from_str(
            r#"{"status":"notSet","detailedMessage":"still warming up"}"#,
        )
        .unwrap();
        assert_eq!(result.status, OperationStatus::NotSet);
        assert_eq!(result.detailed_message.as_deref(), Some("still warming up"));
    }
}
