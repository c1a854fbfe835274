// Workflow executor - drives one execution end to end
//
// Steps 1-3 are strictly sequential; the fan-out runs both branches
// concurrently and waits for both. The whole execution is bounded by a
// deadline; already-issued external calls are not actively cancelled, the
// executor just stops waiting.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::warn;

use ragline_core::{
    BackoffPolicy, GenerationClient, InboundEvent, MessagingClient, RelayError, SessionStore,
};

use crate::workflow::{ExecutionOutcome, ReplyWorkflow};

/// Overall deadline dictated by the upstream synchronous reply expectation
const DEFAULT_DEADLINE: Duration = Duration::from_secs(27);

/// Retry profile for the idempotent calls (reply delivery, session
/// read/write): 3 attempts, 1s initial delay, full jitter.
fn retryable_backoff() -> BackoffPolicy {
    BackoffPolicy::new(3, Duration::from_secs(1), Duration::from_secs(30), true)
}

/// Drives `ReplyWorkflow` executions against injected collaborators.
pub struct WorkflowExecutor {
    sessions: Arc<dyn SessionStore>,
    generator: Arc<dyn GenerationClient>,
    messaging: Arc<dyn MessagingClient>,
    deadline: Duration,
    /// At most 1 attempt: a retried generation could duplicate an expensive,
    /// non-idempotent call. Fail fast instead.
    generation_backoff: BackoffPolicy,
    delivery_backoff: BackoffPolicy,
    persistence_backoff: BackoffPolicy,
}

impl WorkflowExecutor {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        generator: Arc<dyn GenerationClient>,
        messaging: Arc<dyn MessagingClient>,
    ) -> Self {
        Self {
            sessions,
            generator,
            messaging,
            deadline: DEFAULT_DEADLINE,
            generation_backoff: BackoffPolicy::no_retry(),
            delivery_backoff: retryable_backoff(),
            persistence_backoff: retryable_backoff(),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Execute one workflow for an admitted event
    pub async fn execute(&self, event: InboundEvent) -> ExecutionOutcome {
        let message_id = event.message_id.clone();
        let deadline = self.deadline;

        match timeout(deadline, self.run(event)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    message_id = %message_id,
                    deadline_secs = deadline.as_secs(),
                    "Execution abandoned at deadline"
                );
                ExecutionOutcome::failed(RelayError::DeadlineExceeded(deadline.as_secs()))
            }
        }
    }

    async fn run(&self, event: InboundEvent) -> ExecutionOutcome {
        let mut workflow = ReplyWorkflow::new(event);

        // Step 1: load session (idempotent read, retried)
        let conversation_id = workflow.event().conversation_id.clone();
        let record = match self
            .persistence_backoff
            .run(|| self.sessions.get(&conversation_id))
            .await
        {
            Ok(record) => record,
            Err(error) => {
                workflow.fail(&error);
                return ExecutionOutcome::failed(error);
            }
        };
        workflow.on_session_loaded(record, Utc::now());

        // Step 2: shape the request (pure)
        let request = workflow.prepare_request();

        // Step 3: generate, fail-fast
        let result = match self
            .generation_backoff
            .run(|| self.generator.generate(&request))
            .await
        {
            Ok(result) => result,
            Err(error) => {
                workflow.fail(&error);
                return ExecutionOutcome::failed(error);
            }
        };
        workflow.on_generated(result);

        // Step 4: fan out delivery and persistence, wait for both
        let record = workflow.session_record(Utc::now());
        let reply_handle = workflow.event().reply_handle.clone();
        let answer = workflow.answer_text().to_string();

        let (delivered, persisted) = tokio::join!(
            self.delivery_backoff
                .run(|| self.messaging.reply(&reply_handle, &answer)),
            self.persistence_backoff.run(|| self.sessions.put(&record)),
        );

        workflow.on_fanout(delivered, persisted)
    }
}
