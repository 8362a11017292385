use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("model provider error: {0}")]
    Provider(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl PipelineError {
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        PipelineError::Storage(err.to_string())
    }

    pub fn provider<E: std::fmt::Display>(err: E) -> Self {
        PipelineError::Provider(err.to_string())
    }
}
