pub mod captions;
pub mod transcriber;

use std::{fmt::Display, future::Future};

use serde::{Deserialize, Serialize};

use crate::video_id::VideoId;

/// Produces the timed speech of a video, ordered by start time
pub trait TranscriptSource {
    type Error: Display + Send;

    fn fetch_phrases(
        &self,
        video_id: &VideoId,
        mode: TranscriptMode,
    ) -> impl Future<Output = Result<Vec<SpeechPhrase>, Self::Error>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptMode {
    /// Caption track published alongside the video
    Captions,
    /// Speech to text over the downloaded audio track
    Whisper,
}

impl TranscriptMode {
    pub fn from_whisper_flag(use_whisper: bool) -> Self {
        if use_whisper {
            TranscriptMode::Whisper
        } else {
            TranscriptMode::Captions
        }
    }
}

/// A single timestamped utterance. `start` is in seconds from the beginning
/// of the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechPhrase {
    pub start: f64,
    pub text: String,
}

impl SpeechPhrase {
    pub fn new(start: f64, text: impl Into<String>) -> Self {
        SpeechPhrase {
            start,
            text: text.into(),
        }
    }
}
