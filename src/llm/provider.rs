use async_trait::async_trait;

use crate::core::errors::PipelineError;

use super::types::CompletionRequest;

/// External embedding capability: deterministic for a given model id.
///
/// The model id travels with every stored vector so an index built under
/// one model is never queried with another.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the model/version producing the vectors.
    fn model_id(&self) -> &str;

    /// Check whether the provider is reachable.
    async fn health_check(&self) -> Result<bool, PipelineError>;

    /// Embed each input into a fixed-length vector, same order as inputs.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;
}

/// External text-generation capability; stateless per call.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Check whether the provider is reachable.
    async fn health_check(&self) -> Result<bool, PipelineError>;

    /// Non-streaming completion for a role-tagged prompt.
    async fn complete(&self, request: CompletionRequest) -> Result<String, PipelineError>;
}
