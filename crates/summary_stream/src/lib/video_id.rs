use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::Serialize;

use crate::error::Error;

// The identifier must not be followed by another identifier character, so a
// 12 character id is rejected instead of being truncated.
static YT_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.)?(?:youtu\.be/|youtube\.com/(?:embed/|v/|watch\?v=|watch\?.+&v=))([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_\-\s]\S*)?$",
    )
    .unwrap()
});

/// Canonical 11 character YouTube video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Extracts the video id from any accepted YouTube url form.
    ///
    /// Accepted: `youtu.be/<id>`, `youtube.com/embed/<id>`, `youtube.com/v/<id>`,
    /// `youtube.com/watch?v=<id>` and `youtube.com/watch?...&v=<id>`, with or
    /// without scheme and `www.`, optionally followed by extra query or fragment.
    pub fn extract(url: &str) -> Result<Self, Error> {
        YT_URL_RE
            .captures(url)
            .and_then(|cap| cap.get(1))
            .map(|m| VideoId(m.as_str().to_string()))
            .ok_or_else(|| Error::InvalidUrl(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for VideoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VideoId::extract(s)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
