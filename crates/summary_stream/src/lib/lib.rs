pub mod cache;
pub mod coordinator;
mod error;
pub mod grouper;
mod llm;
mod pipeline;
pub mod server;
pub mod tracing;
pub mod types;
pub mod video_id;
pub mod yt;

pub use error::Error;
pub use llm::openai;
pub use llm::{completion::CompletionClient, summarizer::Summarizer};
pub use pipeline::{builder::PipelineBuilder, Pipeline};
pub use types::{Credential, FragmentStream, ShortenRequest, SummaryRequest};
pub use video_id::VideoId;
