// Wire types for the retrieveAndGenerate endpoint

use serde::{Deserialize, Serialize};

use ragline_core::GenerationParams;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAndGenerateRequest {
    pub input: GenerationInput,
    pub retrieve_and_generate_configuration: RetrieveAndGenerateConfiguration,
    /// Present only when resuming a prior conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerationInput {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAndGenerateConfiguration {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub knowledge_base_configuration: KnowledgeBaseConfiguration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseConfiguration {
    pub knowledge_base_id: String,
    pub model_arn: String,
    pub retrieval_configuration: RetrievalConfiguration,
    pub generation_configuration: GenerationConfiguration,
    pub orchestration_configuration: OrchestrationConfiguration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfiguration {
    pub vector_search_configuration: VectorSearchConfiguration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchConfiguration {
    pub override_search_type: &'static str,
    pub number_of_results: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfiguration {
    pub prompt_template: PromptTemplate,
    pub inference_config: InferenceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub text_prompt_template: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationConfiguration {
    pub query_transformation_configuration: QueryTransformationConfiguration,
    pub inference_config: InferenceConfig,
}

#[derive(Debug, Serialize)]
pub struct QueryTransformationConfiguration {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    pub text_inference_config: TextInferenceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextInferenceConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub stop_sequences: Vec<String>,
}

impl From<&GenerationParams> for InferenceConfig {
    fn from(params: &GenerationParams) -> Self {
        Self {
            text_inference_config: TextInferenceConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                max_tokens: params.max_tokens,
                stop_sequences: params.stop_sequences.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAndGenerateResponse {
    pub output: GenerationOutput,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerationOutput {
    pub text: String,
}
