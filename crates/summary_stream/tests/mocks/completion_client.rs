use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use futures::{stream, StreamExt};
use summary_stream::{
    openai::OpenAIError, CompletionClient, Credential, Error, FragmentStream,
};

/// Answers the n-th completion with the n-th script; the last script repeats
#[derive(Clone)]
pub struct MockCompletionClient {
    pub scripts: Vec<Vec<String>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub credentials: Arc<Mutex<Vec<Option<String>>>>,
    pub pulls: Arc<AtomicUsize>,
    pub fail_with: Option<String>,
    /// Script items equal to this marker are yielded as errors
    pub error_marker: Option<String>,
}

impl MockCompletionClient {
    pub fn new(scripts: Vec<Vec<&str>>) -> Self {
        Self {
            scripts: scripts
                .into_iter()
                .map(|script| script.into_iter().map(str::to_string).collect())
                .collect(),
            prompts: Arc::new(Mutex::new(Vec::new())),
            credentials: Arc::new(Mutex::new(Vec::new())),
            pulls: Arc::new(AtomicUsize::new(0)),
            fail_with: None,
            error_marker: None,
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::new(vec![])
        }
    }

    /// Fails mid-stream when the script reaches `marker`
    pub fn with_error_marker(mut self, marker: &str) -> Self {
        self.error_marker = Some(marker.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl CompletionClient for MockCompletionClient {
    const DEFAULT_MODEL: &'static str = "mock-gpt";

    async fn stream_completion(
        &self,
        prompt: String,
        credential: Option<Credential>,
    ) -> Result<FragmentStream, Error> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt);
            prompts.len() - 1
        };
        self.credentials
            .lock()
            .unwrap()
            .push(credential.map(|c| c.token().to_string()));

        if let Some(ref msg) = self.fail_with {
            return Err(Error::Completion(OpenAIError::Api {
                status: 401,
                message: msg.clone(),
            }));
        }

        let script = self
            .scripts
            .get(call)
            .or_else(|| self.scripts.last())
            .cloned()
            .unwrap_or_default();
        let marker = self.error_marker.clone();
        let pulls = Arc::clone(&self.pulls);

        let chunks = script.into_iter().map(move |chunk| {
            if marker.as_deref() == Some(chunk.as_str()) {
                Err(Error::Completion(OpenAIError::Api {
                    status: 429,
                    message: "rate limited".into(),
                }))
            } else {
                Ok(chunk)
            }
        });

        Ok(stream::iter(chunks)
            .inspect(move |_| {
                pulls.fetch_add(1, Ordering::SeqCst);
            })
            .boxed())
    }
}
