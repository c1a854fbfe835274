// Reply workflow state machine
//
// One execution per inbound message:
// Started -> SessionLoaded -> RequestPrepared -> Generated -> Succeeded/Failed.
// The fan-out step (deliver + persist) is judged by on_fanout; both branches
// must succeed for the execution to succeed.

use chrono::{DateTime, Utc};
use tracing::info;

use ragline_core::{
    GenerationRequest, GenerationResult, InboundEvent, RelayError, SessionRecord,
};

/// Workflow state for one execution
#[derive(Debug, Clone)]
pub enum ExecutionState {
    /// Initial state
    Started,

    /// Prior session resolved to a continuation token (empty = no context)
    SessionLoaded { continuation_token: String },

    /// Generation request shaped, ready for the external call
    RequestPrepared { request: GenerationRequest },

    /// Generation finished; fan-out pending
    Generated { result: GenerationResult },

    /// Both fan-out branches succeeded (terminal)
    Succeeded,

    /// Execution failed (terminal)
    Failed { error: String },
}

/// How one execution concluded.
///
/// A failed fan-out keeps the per-branch flags so a persistence failure
/// behind a delivered reply stays distinguishable from a total failure.
#[derive(Debug)]
pub enum ExecutionOutcome {
    Succeeded,
    Failed(FailureReport),
}

#[derive(Debug)]
pub struct FailureReport {
    pub delivered: bool,
    pub persisted: bool,
    pub error: RelayError,
}

impl ExecutionOutcome {
    pub fn failed(error: RelayError) -> Self {
        ExecutionOutcome::Failed(FailureReport {
            delivered: false,
            persisted: false,
            error,
        })
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, ExecutionOutcome::Succeeded)
    }
}

/// The per-message reply workflow
#[derive(Debug)]
pub struct ReplyWorkflow {
    event: InboundEvent,
    state: ExecutionState,
}

impl ReplyWorkflow {
    pub fn new(event: InboundEvent) -> Self {
        Self {
            event,
            state: ExecutionState::Started,
        }
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn event(&self) -> &InboundEvent {
        &self.event
    }

    /// Step 1: resolve the prior session. A missing or expired record means
    /// the turn runs without prior context.
    pub fn on_session_loaded(&mut self, record: Option<SessionRecord>, now: DateTime<Utc>) {
        let continuation_token = match record {
            Some(record) if !record.is_expired(now) => record.continuation_token,
            _ => String::new(),
        };

        info!(
            message_id = %self.event.message_id,
            has_context = !continuation_token.is_empty(),
            "Session loaded"
        );
        self.state = ExecutionState::SessionLoaded { continuation_token };
    }

    /// Step 2: shape the generation request. Pure, no I/O.
    pub fn prepare_request(&mut self) -> GenerationRequest {
        let continuation_token = match &self.state {
            ExecutionState::SessionLoaded { continuation_token } => continuation_token.clone(),
            _ => String::new(),
        };

        let request = GenerationRequest::new(self.event.text.clone(), continuation_token);
        self.state = ExecutionState::RequestPrepared {
            request: request.clone(),
        };
        request
    }

    /// Step 3: record the generation result
    pub fn on_generated(&mut self, result: GenerationResult) {
        info!(
            message_id = %self.event.message_id,
            answer_chars = result.answer_text.chars().count(),
            "Generation completed"
        );
        self.state = ExecutionState::Generated { result };
    }

    /// Answer text for the delivery branch; empty before generation
    pub fn answer_text(&self) -> &str {
        match &self.state {
            ExecutionState::Generated { result } => &result.answer_text,
            _ => "",
        }
    }

    /// Session record for the persistence branch, expiring 22h from `now`
    pub fn session_record(&self, now: DateTime<Utc>) -> SessionRecord {
        let continuation_token = match &self.state {
            ExecutionState::Generated { result } => result.continuation_token.clone(),
            _ => String::new(),
        };
        SessionRecord::new(self.event.conversation_id.clone(), continuation_token, now)
    }

    /// Step 4: judge the fan-out. Both branches must succeed; a persistence
    /// failure is never masked by a delivered reply.
    pub fn on_fanout(
        &mut self,
        delivered: Result<(), RelayError>,
        persisted: Result<(), RelayError>,
    ) -> ExecutionOutcome {
        match (delivered, persisted) {
            (Ok(()), Ok(())) => {
                self.state = ExecutionState::Succeeded;
                ExecutionOutcome::Succeeded
            }
            (delivered, persisted) => {
                let delivered_ok = delivered.is_ok();
                let persisted_ok = persisted.is_ok();
                // Persistence failure takes precedence in the report; losing
                // session continuity must be alertable even after a reply.
                let error = match (delivered, persisted) {
                    (_, Err(error)) => error,
                    (Err(error), _) => error,
                    _ => unreachable!("at least one branch failed"),
                };

                self.state = ExecutionState::Failed {
                    error: error.to_string(),
                };
                ExecutionOutcome::Failed(FailureReport {
                    delivered: delivered_ok,
                    persisted: persisted_ok,
                    error,
                })
            }
        }
    }

    /// Mark the execution failed outside the fan-out step
    pub fn fail(&mut self, error: &RelayError) {
        self.state = ExecutionState::Failed {
            error: error.to_string(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_event() -> InboundEvent {
        InboundEvent {
            message_id: "m1".to_string(),
            conversation_id: "c1".to_string(),
            reply_handle: "r1".to_string(),
            text: "hello".to_string(),
            author_display_name: "Alex".to_string(),
            received_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn generated() -> GenerationResult {
        GenerationResult {
            answer_text: "hi".to_string(),
            continuation_token: "t1".to_string(),
        }
    }

    #[test]
    fn missing_session_prepares_an_empty_continuation_token() {
        let mut workflow = ReplyWorkflow::new(test_event());
        workflow.on_session_loaded(None, Utc::now());

        let request = workflow.prepare_request();
        assert_eq!(request.text, "hello");
        assert_eq!(request.continuation_token, "");
    }

    #[test]
    fn expired_session_is_treated_as_absent() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let record = SessionRecord {
            conversation_id: "c1".to_string(),
            continuation_token: "stale".to_string(),
            expires_at: now.timestamp() - 1,
        };

        let mut workflow = ReplyWorkflow::new(test_event());
        workflow.on_session_loaded(Some(record), now);

        assert_eq!(workflow.prepare_request().continuation_token, "");
    }

    #[test]
    fn live_session_token_flows_into_the_request() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let record = SessionRecord::new("c1", "prior", now);

        let mut workflow = ReplyWorkflow::new(test_event());
        workflow.on_session_loaded(Some(record), now);

        assert_eq!(workflow.prepare_request().continuation_token, "prior");
    }

    #[test]
    fn session_record_carries_the_new_token_and_22h_expiry() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_250).unwrap();
        let mut workflow = ReplyWorkflow::new(test_event());
        workflow.on_session_loaded(None, now);
        workflow.prepare_request();
        workflow.on_generated(generated());

        let record = workflow.session_record(now);
        assert_eq!(record.conversation_id, "c1");
        assert_eq!(record.continuation_token, "t1");
        assert_eq!(record.expires_at, 1_700_000_000 + 22 * 60 * 60);
    }

    #[test]
    fn fanout_success_on_both_branches_succeeds() {
        let mut workflow = ReplyWorkflow::new(test_event());
        workflow.on_generated(generated());

        let outcome = workflow.on_fanout(Ok(()), Ok(()));
        assert!(outcome.is_succeeded());
        assert!(matches!(workflow.state(), ExecutionState::Succeeded));
    }

    #[test]
    fn persistence_failure_is_not_masked_by_delivery_success() {
        let mut workflow = ReplyWorkflow::new(test_event());
        workflow.on_generated(generated());

        let outcome = workflow.on_fanout(Ok(()), Err(RelayError::persistence("write failed")));
        match outcome {
            ExecutionOutcome::Failed(report) => {
                assert!(report.delivered);
                assert!(!report.persisted);
                assert!(matches!(report.error, RelayError::Persistence(_)));
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn delivery_failure_fails_the_execution() {
        let mut workflow = ReplyWorkflow::new(test_event());
        workflow.on_generated(generated());

        let outcome = workflow.on_fanout(Err(RelayError::delivery("unreachable")), Ok(()));
        match outcome {
            ExecutionOutcome::Failed(report) => {
                assert!(!report.delivered);
                assert!(report.persisted);
            }
            _ => panic!("expected failure"),
        }
    }
}
