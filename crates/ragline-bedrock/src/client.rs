// Retrieve-and-generate HTTP client
//
// Decision: no internal retry; the orchestrator decides whether a generation
// call may be attempted again.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use ragline_core::{GenerationClient, GenerationRequest, GenerationResult, RelayError, Result};

use crate::types::{
    GenerationConfiguration, GenerationInput, InferenceConfig, KnowledgeBaseConfiguration,
    OrchestrationConfiguration, PromptTemplate, QueryTransformationConfiguration,
    RetrievalConfiguration, RetrieveAndGenerateConfiguration, RetrieveAndGenerateRequest,
    RetrieveAndGenerateResponse, VectorSearchConfiguration,
};

const SEARCH_TYPE: &str = "HYBRID";
const SEARCH_RESULTS: u32 = 3;
const QUERY_TRANSFORMATION: &str = "QUERY_DECOMPOSITION";

/// Environment configuration for the knowledge-base endpoint
#[derive(Clone)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub knowledge_base_id: String,
    pub model_arn: String,
    pub prompt_template: String,
    pub api_key: Option<String>,
}

impl GenerationConfig {
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("GENERATION_ENDPOINT")
            .map_err(|_| RelayError::config("GENERATION_ENDPOINT is required"))?;
        let knowledge_base_id = std::env::var("KNOWLEDGE_BASE_ID")
            .map_err(|_| RelayError::config("KNOWLEDGE_BASE_ID is required"))?;
        let model_arn = std::env::var("INFERENCE_MODEL_ARN")
            .map_err(|_| RelayError::config("INFERENCE_MODEL_ARN is required"))?;
        let prompt_template = std::env::var("PROMPT_TEMPLATE").unwrap_or_default();
        let api_key = std::env::var("GENERATION_API_KEY").ok();

        Ok(Self {
            endpoint,
            knowledge_base_id,
            model_arn,
            prompt_template,
            api_key,
        })
    }
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("endpoint", &self.endpoint)
            .field("knowledge_base_id", &self.knowledge_base_id)
            .field("model_arn", &self.model_arn)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Client for the knowledge-base retrieveAndGenerate operation
#[derive(Debug, Clone)]
pub struct RetrieveAndGenerateClient {
    http: Client,
    config: GenerationConfig,
}

impl RetrieveAndGenerateClient {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn build_request(&self, request: &GenerationRequest) -> RetrieveAndGenerateRequest {
        RetrieveAndGenerateRequest {
            input: GenerationInput {
                text: request.text.clone(),
            },
            retrieve_and_generate_configuration: RetrieveAndGenerateConfiguration {
                kind: "KNOWLEDGE_BASE",
                knowledge_base_configuration: KnowledgeBaseConfiguration {
                    knowledge_base_id: self.config.knowledge_base_id.clone(),
                    model_arn: self.config.model_arn.clone(),
                    retrieval_configuration: RetrievalConfiguration {
                        vector_search_configuration: VectorSearchConfiguration {
                            override_search_type: SEARCH_TYPE,
                            number_of_results: SEARCH_RESULTS,
                        },
                    },
                    generation_configuration: GenerationConfiguration {
                        prompt_template: PromptTemplate {
                            text_prompt_template: self.config.prompt_template.clone(),
                        },
                        inference_config: InferenceConfig::from(&request.params),
                    },
                    orchestration_configuration: OrchestrationConfiguration {
                        query_transformation_configuration: QueryTransformationConfiguration {
                            kind: QUERY_TRANSFORMATION,
                        },
                        inference_config: InferenceConfig::from(&request.params),
                    },
                },
            },
            session_id: if request.continuation_token.is_empty() {
                None
            } else {
                Some(request.continuation_token.clone())
            },
        }
    }
}

#[async_trait]
impl GenerationClient for RetrieveAndGenerateClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let url = format!(
            "{}/retrieveAndGenerate",
            self.config.endpoint.trim_end_matches('/')
        );
        let body = self.build_request(request);

        let mut builder = self.http.post(&url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RelayError::transient(format!("generation request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(RelayError::transient(format!(
                    "generation returned {status}: {detail}"
                )))
            } else {
                Err(RelayError::generation(format!(
                    "generation returned {status}: {detail}"
                )))
            };
        }

        let parsed: RetrieveAndGenerateResponse = response
            .json()
            .await
            .map_err(|e| RelayError::generation(format!("generation body invalid: {e}")))?;

        debug!(
            continuation = %parsed.session_id,
            answer_chars = parsed.output.text.chars().count(),
            "Generation completed"
        );

        Ok(GenerationResult {
            answer_text: parsed.output.text,
            continuation_token: parsed.session_id,
        })
    }
}
