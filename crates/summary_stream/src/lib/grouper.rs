use itertools::Itertools;

use crate::yt::SpeechPhrase;

pub const DEFAULT_MAX_SEGMENT_LENGTH: usize = 300;

/// A contiguous, non-empty run of phrases summarized together
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    phrases: Vec<SpeechPhrase>,
}

impl Segment {
    /// Start of the first phrase, in seconds
    pub fn start(&self) -> f64 {
        self.phrases.first().map_or(0.0, |p| p.start)
    }

    pub fn phrases(&self) -> &[SpeechPhrase] {
        &self.phrases
    }

    /// Length of the concatenated phrase texts, in characters
    pub fn text_len(&self) -> usize {
        self.phrases.iter().map(|p| p.text.chars().count()).sum()
    }

    /// Renders the segment for a prompt, one timestamped line per phrase
    pub fn transcript(&self) -> String {
        self.phrases
            .iter()
            .map(|p| format!("[{} | {}s] {}", format_hms(p.start), p.start as u64, p.text.trim()))
            .join("\n")
    }
}

fn format_hms(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Greedily merges phrases into segments whose concatenated text stays within
/// `max_length` characters.
///
/// A phrase is never split: one longer than `max_length` forms a segment on
/// its own. A `max_length` of 0 behaves like 1.
pub fn group_phrases(
    phrases: impl IntoIterator<Item = SpeechPhrase>,
    max_length: usize,
) -> Vec<Segment> {
    let max_length = max_length.max(1);

    let mut segments = Vec::new();
    let mut current = Vec::new();
    let mut current_len = 0;

    for phrase in phrases {
        let len = phrase.text.chars().count();
        if !current.is_empty() && current_len + len > max_length {
            segments.push(Segment {
                phrases: std::mem::take(&mut current),
            });
            current_len = 0;
        }
        current_len += len;
        current.push(phrase);
    }

    if !current.is_empty() {
        segments.push(Segment { phrases: current });
    }

    segments
}
