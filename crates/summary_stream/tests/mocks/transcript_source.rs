use std::sync::{Arc, Mutex};

use summary_stream::{
    yt::{SpeechPhrase, TranscriptMode, TranscriptSource},
    VideoId,
};

#[derive(Clone)]
pub struct MockTranscriptSource {
    pub phrases: Vec<SpeechPhrase>,
    pub calls: Arc<Mutex<Vec<(String, TranscriptMode)>>>,
    pub fail_with: Option<String>,
}

impl MockTranscriptSource {
    pub fn new(phrases: Vec<SpeechPhrase>) -> Self {
        Self {
            phrases,
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            phrases: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: Some(msg.to_string()),
        }
    }
}

impl TranscriptSource for MockTranscriptSource {
    type Error = anyhow::Error;

    async fn fetch_phrases(
        &self,
        video_id: &VideoId,
        mode: TranscriptMode,
    ) -> Result<Vec<SpeechPhrase>, Self::Error> {
        self.calls
            .lock()
            .unwrap()
            .push((video_id.to_string(), mode));
        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }
        Ok(self.phrases.clone())
    }
}
