use crate::openai::OpenAIError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid youtube url: {0}")]
    InvalidUrl(String),
    #[error("Failed to retrieve transcript: {0}")]
    Transcript(String),
    #[error("Completion request failed: {0}")]
    Completion(#[from] OpenAIError),
    #[error("Stream cancelled")]
    Cancelled,
}
