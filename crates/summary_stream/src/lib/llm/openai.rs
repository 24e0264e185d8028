use std::{collections::VecDeque, path::PathBuf, pin::Pin};

use futures::{stream, Stream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::Error,
    llm::{completion::CompletionClient, event_stream::EventStreamDecoder},
    types::{Credential, FragmentStream},
};

#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: Credential,
    base_url: String,
    model: String,
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAIError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: Credential::new(api_key),
            base_url: "https://api.openai.com/v1".into(),
            model: Self::DEFAULT_MODEL.into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub async fn send_transcribe_request(
        &self,
        file: impl Into<PathBuf>,
        model_name: impl Into<String>,
        prompt: Option<String>,
    ) -> Result<TranscribeResponse, OpenAIError> {
        let audio_path = file.into();

        let bytes = tokio::fs::read(&audio_path).await?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("audio.mp3")
            .mime_str("audio/mpeg")?;

        let mut form = reqwest::multipart::Form::new()
            .text("model", model_name.into())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .part("file", part);

        if let Some(prompt) = prompt {
            form = form.text("prompt", prompt);
        }

        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.token())
            .multipart(form)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(OpenAIError::Api { status, message });
        }

        let response = resp.json::<TranscribeResponse>().await?;

        Ok(response)
    }

    /// Sends a streaming chat completion request and yields the content deltas
    pub async fn send_completion_stream_request(
        &self,
        user_content: impl Into<String>,
        credential: Option<&Credential>,
    ) -> Result<impl Stream<Item = Result<String, OpenAIError>> + Send + 'static, OpenAIError>
    {
        let body = serde_json::json!({
            "model": self.model,
            "stream": true,
            "max_tokens": 1000,
            "temperature": 0,
            "top_p": 1,
            "frequency_penalty": 0,
            "presence_penalty": 0.6,
            "messages": [
                {
                    "role": "user",
                    "content": user_content.into()
                }
            ]
        });

        let api_key = credential.unwrap_or(&self.api_key);

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key.token())
            .json(&body)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            tracing::error!(status, %message, "Completion request rejected");
            return Err(OpenAIError::Api { status, message });
        }

        Ok(completion_deltas(resp.bytes_stream()))
    }
}

impl CompletionClient for OpenAIClient {
    const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    async fn stream_completion(
        &self,
        prompt: String,
        credential: Option<Credential>,
    ) -> Result<FragmentStream, Error> {
        let deltas = self
            .send_completion_stream_request(prompt, credential.as_ref())
            .await?;

        Ok(deltas.map_err(Error::from).boxed())
    }
}

struct DeltaReader<S> {
    body: Pin<Box<S>>,
    decoder: EventStreamDecoder,
    pending: VecDeque<String>,
    done: bool,
}

impl<S, B> DeltaReader<S>
where
    S: Stream<Item = Result<B, reqwest::Error>>,
    B: AsRef<[u8]> + Send,
{
    async fn next_delta(&mut self) -> Result<Option<String>, OpenAIError> {
        loop {
            if let Some(delta) = self.pending.pop_front() {
                return Ok(Some(delta));
            }
            if self.done {
                return Ok(None);
            }

            match self.body.next().await {
                Some(bytes) => {
                    let events = self.decoder.push(bytes?.as_ref());
                    self.accept(events)?;
                }
                None => {
                    let trailing = self.decoder.finish();
                    self.accept(trailing)?;
                    self.done = true;
                }
            }
        }
    }

    /// Queues the content of every decoded event; `[DONE]` ends the stream
    fn accept(&mut self, events: impl IntoIterator<Item = String>) -> Result<(), OpenAIError> {
        for data in events {
            if self.done {
                break;
            }
            if data == "[DONE]" {
                self.done = true;
                break;
            }

            let chunk = serde_json::from_str::<CompletionChunk>(&data)?;
            if let Some(error) = chunk.error {
                return Err(OpenAIError::Api {
                    status: 0,
                    message: error.message,
                });
            }
            self.pending.extend(
                chunk
                    .choices
                    .into_iter()
                    .filter_map(|choice| choice.delta.content)
                    .filter(|content| !content.is_empty()),
            );
        }
        Ok(())
    }
}

/// Turns a chat completion event-stream body into its content deltas
fn completion_deltas<S, B>(
    body: S,
) -> impl Stream<Item = Result<String, OpenAIError>> + Send + 'static
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send,
{
    let reader = DeltaReader {
        body: Box::pin(body),
        decoder: EventStreamDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::try_unfold(reader, |mut reader| async move {
        let delta = reader.next_delta().await?;
        Ok::<_, OpenAIError>(delta.map(|delta| (delta, reader)))
    })
}

#[derive(Debug, Deserialize)]
pub struct TranscribeResponse {
    pub duration: f64,
    pub text: String,
    pub segments: Option<Vec<TranscribeSegment>>,
}

#[derive(Debug, Deserialize)]
pub struct TranscribeSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<CompletionChunkChoice>,
    error: Option<CompletionApiError>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunkChoice {
    delta: CompletionDelta,
}

#[derive(Debug, Deserialize)]
struct CompletionDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionApiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(
        chunks: Vec<&'static str>,
    ) -> impl Stream<Item = Result<&'static [u8], reqwest::Error>> + Send + 'static {
        stream::iter(chunks.into_iter().map(|c| Ok(c.as_bytes())))
    }

    #[tokio::test]
    async fn test_deltas_in_order_until_done() {
        let deltas = completion_deltas(body(vec![
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"## Intro\\n\"}}]}\n\ndata: {\"choices\":[{\"del",
            "ta\":{\"content\":\"hello\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        ]));

        let deltas = deltas.try_collect::<Vec<_>>().await.unwrap();
        assert_eq!(deltas, vec!["## Intro\n", "hello"]);
    }

    #[tokio::test]
    async fn test_body_ending_without_done_marker() {
        let deltas = completion_deltas(body(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}",
        ]));

        let deltas = deltas.try_collect::<Vec<_>>().await.unwrap();
        assert_eq!(deltas, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_error_event_terminates_stream() {
        let mut deltas = Box::pin(completion_deltas(body(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"quota exceeded\"}}\n\n",
        ])));

        assert_eq!(deltas.next().await.unwrap().unwrap(), "partial");
        let err = deltas.next().await.unwrap().unwrap_err();
        assert!(
            matches!(err, OpenAIError::Api { ref message, .. } if message == "quota exceeded"),
            "unexpected error: {err:?}"
        );
        assert!(deltas.next().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_chunk_is_an_error() {
        let deltas = completion_deltas(body(vec!["data: {not json}\n\n"]));
        let result = deltas.try_collect::<Vec<_>>().await;
        assert!(matches!(result, Err(OpenAIError::Json(_))));
    }
}
