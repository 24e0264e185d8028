use futures::{
    stream::{self, BoxStream},
    Stream, StreamExt,
};
use serde::Deserialize;

use crate::error::Error;

/// Lazy, ordered sequence of markdown fragments. Concatenating every item of
/// a run yields the complete markdown document.
pub type FragmentStream = BoxStream<'static, Result<String, Error>>;

/// Bearer token forwarded by a client to use instead of the configured API key
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Credential(token.into())
    }

    /// Parses an `Authorization` header value of the form `Bearer <token>`.
    /// Anything else yields `None`.
    pub fn from_authorization(header: &str) -> Option<Self> {
        let token = header.strip_prefix("Bearer ")?;
        if token.is_empty() || token.contains(char::is_whitespace) {
            return None;
        }
        Some(Credential(token.to_string()))
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(**redacted**)")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRequest {
    pub url: String,
    #[serde(default)]
    pub use_sse: bool,
    #[serde(default)]
    pub use_whisper: bool,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

fn default_use_cache() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShortenRequest {
    pub content: String,
    #[serde(default)]
    pub use_sse: bool,
}

/// Keeps `guard` alive for as long as `stream` is polled. The guard is
/// dropped exactly once: when the stream is exhausted or when it is dropped
/// half way through.
pub fn guarded<S, G>(stream: S, guard: G) -> impl Stream<Item = S::Item> + Send + 'static
where
    S: Stream + Send + 'static,
    G: Send + 'static,
{
    stream::unfold((Box::pin(stream), guard), |(mut stream, guard)| async move {
        let item = stream.next().await?;
        Some((item, (stream, guard)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header_yields_credential() {
        let credential = Credential::from_authorization("Bearer sk-test-123").unwrap();
        assert_eq!(credential.token(), "sk-test-123");
    }

    #[test]
    fn test_malformed_headers_yield_none() {
        for header in [
            "",
            "Bearer",
            "Bearer ",
            "bearer sk-test",
            "Basic dXNlcjpwYXNz",
            "Bearer sk test",
            "sk-test",
        ] {
            assert!(
                Credential::from_authorization(header).is_none(),
                "{header:?} should not produce a credential"
            );
        }
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("sk-secret");
        assert!(!format!("{credential:?}").contains("sk-secret"));
    }

    #[test]
    fn test_summary_request_defaults() {
        let request: SummaryRequest =
            serde_json::from_str(r#"{"url": "https://youtu.be/dQw4w9WgXcQ"}"#).unwrap();
        assert!(!request.use_sse);
        assert!(!request.use_whisper);
        assert!(request.use_cache);
    }

    #[tokio::test]
    async fn test_guard_dropped_when_stream_abandoned() {
        let guard = std::sync::Arc::new(());
        let observer = std::sync::Arc::downgrade(&guard);

        let mut numbers = Box::pin(guarded(stream::iter(1..=3), guard));
        assert_eq!(numbers.next().await, Some(1));
        assert!(observer.upgrade().is_some());

        drop(numbers);
        assert!(observer.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_guard_dropped_when_stream_exhausted() {
        let guard = std::sync::Arc::new(());
        let observer = std::sync::Arc::downgrade(&guard);

        let mut numbers = Box::pin(guarded(stream::iter(1..=2), guard));
        while numbers.next().await.is_some() {}
        assert!(observer.upgrade().is_none());
    }
}
