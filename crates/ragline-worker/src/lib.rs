// Ragline worker - workflow orchestration
//
// Decision: the state machine is pure and synchronous; all I/O lives in the
// executor, which drives it with constructor-injected collaborators.
// Decision: the dispatcher admits at most one execution per message id
// within a retention window and runs executions as Tokio tasks.

pub mod dispatcher;
pub mod executor;
pub mod workflow;

pub use dispatcher::{DispatchAck, DispatchStatus, EventDispatcher};
pub use executor::WorkflowExecutor;
pub use workflow::{ExecutionOutcome, FailureReport, ReplyWorkflow};
