use std::future::Future;

use crate::{
    error::Error,
    types::{Credential, FragmentStream},
};

/// An LLM that answers a prompt incrementally
pub trait CompletionClient {
    const DEFAULT_MODEL: &'static str;

    /// Starts a completion and returns its chunks as they arrive. `credential`
    /// replaces the client's configured API key for this call only.
    fn stream_completion(
        &self,
        prompt: String,
        credential: Option<Credential>,
    ) -> impl Future<Output = Result<FragmentStream, Error>> + Send;
}
