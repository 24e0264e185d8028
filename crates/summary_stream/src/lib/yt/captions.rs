//! # Caption Parser
//!
//! Extracts caption tracks from a YouTube watch page and turns the `json3`
//! timed text format into speech phrases.

use std::{ops::Deref, sync::LazyLock};

use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize};

use crate::yt::{transcriber::TranscriptError, SpeechPhrase};

static YT_PLAYER_RESPONSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?s)var\s+ytInitialPlayerResponse\s*=\s*(\{.*?\});\s*(?:var\s|</script>)",
    )
    .unwrap()
});

pub struct WatchPage(String);

impl Deref for WatchPage {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<String> for WatchPage {
    fn from(value: String) -> Self {
        WatchPage(value)
    }
}

impl WatchPage {
    pub fn to_json<T>(&self) -> Result<T, TranscriptError>
    where
        T: DeserializeOwned,
    {
        YT_PLAYER_RESPONSE_RE
            .captures(self)
            .and_then(|cap| cap.get(1))
            .and_then(|m| serde_json::from_str(m.as_str()).ok())
            .ok_or(TranscriptError::Parse(
                "Failed to extract ytInitialPlayerResponse from the page's script tag",
            ))
    }

    /// Lists the caption tracks advertised by the player response
    pub fn caption_tracks(&self) -> Result<Vec<CaptionTrack>, TranscriptError> {
        let response = self.to_json::<PlayerResponse>()?;

        Ok(response
            .captions
            .map(|c| c.tracklist.caption_tracks)
            .unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct PlayerResponse {
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct Captions {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    tracklist: Tracklist,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tracklist {
    #[serde(default)]
    caption_tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    /// `asr` for automatically generated tracks
    pub kind: Option<String>,
}

impl CaptionTrack {
    fn is_english(&self) -> bool {
        self.language_code == "en" || self.language_code.starts_with("en-")
    }

    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    pub fn json3_url(&self) -> String {
        format!("{}&fmt=json3", self.base_url)
    }
}

/// Picks a manual english track, then any english track, then the first one
pub fn select_track(tracks: &[CaptionTrack]) -> Option<&CaptionTrack> {
    tracks
        .iter()
        .find(|t| t.is_english() && !t.is_generated())
        .or_else(|| tracks.iter().find(|t| t.is_english()))
        .or_else(|| tracks.first())
}

#[derive(Debug, Default, Deserialize)]
pub struct TimedText {
    #[serde(default)]
    events: Vec<TimedTextEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimedTextEvent {
    t_start_ms: Option<u64>,
    #[serde(default)]
    segs: Vec<TimedTextSeg>,
}

#[derive(Debug, Deserialize)]
struct TimedTextSeg {
    #[serde(default)]
    utf8: String,
}

impl TimedText {
    pub fn into_phrases(self) -> Vec<SpeechPhrase> {
        self.events
            .into_iter()
            .filter_map(|event| {
                let text = event
                    .segs
                    .iter()
                    .map(|seg| seg.utf8.as_str())
                    .collect::<String>()
                    .replace('\n', " ");
                let text = text.trim();
                if text.is_empty() {
                    return None;
                }
                let start = event.t_start_ms.unwrap_or_default() as f64 / 1000.0;
                Some(SpeechPhrase::new(start, text))
            })
            .collect()
    }
}
