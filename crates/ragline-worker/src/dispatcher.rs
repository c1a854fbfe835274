// Idempotent event dispatcher
//
// The upstream webhook transport is at-least-once: the same message id can
// arrive in more than one delivery. Admission is keyed by message id and
// remembered for a retention window at least as long as the upstream
// redelivery window, so a redelivered event never starts a second execution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use ragline_core::{InboundEvent, Result};

use crate::executor::WorkflowExecutor;
use crate::workflow::ExecutionOutcome;

const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

/// Per-event dispatch acknowledgement returned to the gateway
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DispatchAck {
    pub message_id: String,
    pub status: DispatchStatus,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    /// A new execution was started for this message id
    Admitted,
    /// The message id was already admitted within the retention window
    Duplicate,
}

/// Dispatches admitted events as background Tokio tasks.
pub struct EventDispatcher {
    executor: Arc<WorkflowExecutor>,
    retention: Duration,
    /// message_id -> admission time, pruned opportunistically
    admitted: Arc<Mutex<HashMap<String, Instant>>>,
    /// message_id -> running execution
    active: Arc<RwLock<HashMap<String, JoinHandle<()>>>>,
}

impl EventDispatcher {
    pub fn new(executor: Arc<WorkflowExecutor>) -> Self {
        Self::with_retention(executor, DEFAULT_RETENTION)
    }

    pub fn with_retention(executor: Arc<WorkflowExecutor>, retention: Duration) -> Self {
        Self {
            executor,
            retention,
            admitted: Arc::new(Mutex::new(HashMap::new())),
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Retention window from DEDUP_RETENTION_SECS, defaulting to one hour
    pub fn retention_from_env() -> Duration {
        std::env::var("DEDUP_RETENTION_SECS")
            .ok()
            .and_then(|value| value.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RETENTION)
    }

    /// Dispatch one event. Returns quickly; the execution continues in the
    /// background and its outcome is logged when it concludes.
    pub async fn dispatch(&self, event: InboundEvent) -> Result<DispatchAck> {
        let message_id = event.message_id.clone();

        if !self.admit(&message_id).await {
            warn!(message_id = %message_id, "Duplicate delivery, execution not started");
            return Ok(DispatchAck {
                message_id,
                status: DispatchStatus::Duplicate,
            });
        }

        info!(message_id = %message_id, "Starting workflow execution");

        let executor = self.executor.clone();
        let active = self.active.clone();
        let task_message_id = message_id.clone();

        let handle = tokio::spawn(async move {
            let outcome = executor.execute(event).await;
            match outcome {
                ExecutionOutcome::Succeeded => {
                    info!(message_id = %task_message_id, "Execution succeeded");
                }
                ExecutionOutcome::Failed(report) => {
                    error!(
                        message_id = %task_message_id,
                        delivered = report.delivered,
                        persisted = report.persisted,
                        error = %report.error,
                        "Execution failed"
                    );
                }
            }
            active.write().await.remove(&task_message_id);
        });

        self.active.write().await.insert(message_id.clone(), handle);

        Ok(DispatchAck {
            message_id,
            status: DispatchStatus::Admitted,
        })
    }

    /// Record the admission; false when the id was already admitted within
    /// the retention window.
    async fn admit(&self, message_id: &str) -> bool {
        let now = Instant::now();
        let mut admitted = self.admitted.lock().await;
        admitted.retain(|_, at| now.duration_since(*at) < self.retention);

        if admitted.contains_key(message_id) {
            return false;
        }
        admitted.insert(message_id.to_string(), now);
        true
    }

    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    /// Wait for every in-flight execution to conclude. Used on shutdown and
    /// by tests.
    pub async fn drain(&self) {
        loop {
            let handle = {
                let mut active = self.active.write().await;
                match active.keys().next().cloned() {
                    Some(key) => active.remove(&key),
                    None => break,
                }
            };
            if let Some(handle) = handle {
                let _ = handle.await;
            }
        }
    }
}
