use std::sync::Arc;

use futures::{future, stream, StreamExt, TryStreamExt};
use tokio::sync::Semaphore;

use crate::{
    error::Error,
    grouper::Segment,
    llm::completion::CompletionClient,
    types::{guarded, Credential, FragmentStream},
    video_id::VideoId,
};

/// Converts transcript segments, or an existing markdown document, into
/// markdown through an LLM, fragment by fragment.
pub struct Summarizer<C> {
    client: Arc<C>,
    permits: Option<Arc<Semaphore>>,
}

impl<C> Summarizer<C>
where
    C: CompletionClient + Send + Sync + 'static,
{
    const STUDY_GUIDE_PROMPT: &str = include_str!("./prompts/study_guide.txt");
    const SHORTEN_PROMPT: &str = include_str!("./prompts/shorten.txt");

    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
            permits: None,
        }
    }

    /// Caps the number of completions in flight across every stream produced
    /// by this summarizer
    pub fn with_permits(mut self, permits: Arc<Semaphore>) -> Self {
        self.permits = Some(permits);
        self
    }

    pub fn study_guide_prompt(segment: &Segment, video_id: &VideoId) -> String {
        Self::STUDY_GUIDE_PROMPT
            .replace("{video_id}", video_id.as_str())
            .replace("{text}", &segment.transcript())
    }

    pub fn shorten_prompt(markdown: &str) -> String {
        Self::SHORTEN_PROMPT.replace("{text}", markdown)
    }

    /// Summarizes every segment in order. Each segment's completion starts
    /// only once the previous one is drained and is followed by a `"\n"`
    /// fragment.
    pub fn summarize_segments(
        &self,
        segments: Vec<Segment>,
        credential: Option<Credential>,
        video_id: &VideoId,
    ) -> FragmentStream {
        let client = Arc::clone(&self.client);
        let permits = self.permits.clone();
        let video_id = video_id.clone();

        stream::iter(segments)
            .then(move |segment| {
                let prompt = Self::study_guide_prompt(&segment, &video_id);
                tracing::debug!(%video_id, start = segment.start(), "Summarizing segment");
                complete(
                    Arc::clone(&client),
                    permits.clone(),
                    prompt,
                    credential.clone(),
                )
            })
            .map_ok(|fragments| {
                fragments.chain(stream::once(future::ready(Ok("\n".to_string()))))
            })
            .try_flatten()
            .boxed()
    }

    /// Rewrites `markdown` into a shorter document with a single completion
    pub fn shorten(&self, markdown: String, credential: Option<Credential>) -> FragmentStream {
        let prompt = Self::shorten_prompt(&markdown);

        stream::once(complete(
            Arc::clone(&self.client),
            self.permits.clone(),
            prompt,
            credential,
        ))
        .try_flatten()
        .boxed()
    }
}

/// Starts one completion. The admission permit, when a pool is configured,
/// stays with the returned fragments and is released once they finish or are
/// dropped.
async fn complete<C>(
    client: Arc<C>,
    permits: Option<Arc<Semaphore>>,
    prompt: String,
    credential: Option<Credential>,
) -> Result<FragmentStream, Error>
where
    C: CompletionClient + Send + Sync + 'static,
{
    let permit = match permits {
        Some(permits) => Some(
            permits
                .acquire_owned()
                .await
                .map_err(|_| Error::Cancelled)?,
        ),
        None => None,
    };

    let fragments = client
        .stream_completion(prompt, credential)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Failed to start completion"))?;

    Ok(match permit {
        Some(permit) => guarded(fragments, permit).boxed(),
        None => fragments,
    })
}
