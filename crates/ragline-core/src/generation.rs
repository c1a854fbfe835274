// Generation request/result DTOs
//
// Values flow only within one workflow execution; nothing here is persisted.

use serde::{Deserialize, Serialize};

/// Fixed decoding parameters for every generation call: deterministic
/// decoding, bounded output, agent-style stop condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            max_tokens: 2048,
            stop_sequences: vec!["\nObservation".to_string()],
        }
    }
}

/// Request shaped by the orchestrator for one generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The user's message text
    pub text: String,
    /// Continuation token from the prior turn; empty means no prior context
    pub continuation_token: String,
    pub params: GenerationParams,
}

impl GenerationRequest {
    pub fn new(text: impl Into<String>, continuation_token: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            continuation_token: continuation_token.into(),
            params: GenerationParams::default(),
        }
    }

    /// True when this request resumes a prior conversation
    pub fn has_continuation(&self) -> bool {
        !self.continuation_token.is_empty()
    }
}

/// Result of one generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub answer_text: String,
    /// Token that lets the next turn resume this context
    pub continuation_token: String,
}
