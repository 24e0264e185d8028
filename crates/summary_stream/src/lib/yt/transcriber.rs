use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use tokio::process::Command;

use crate::{
    openai::{OpenAIClient, OpenAIError, TranscribeResponse},
    video_id::VideoId,
    yt::{
        captions::{select_track, TimedText, WatchPage},
        SpeechPhrase, TranscriptMode, TranscriptSource,
    },
};

static DOWNLOAD_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(&'static str),
    #[error("No captions available for video {0}")]
    NoCaptions(VideoId),
    #[error("yt-dlp failed: {0}")]
    YtDlp(String),
    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),
    #[error("Whisper transcription failed: {0}")]
    Whisper(#[from] OpenAIError),
}

/// Fetches transcripts of YouTube videos, either from the published caption
/// tracks or by running the audio track through whisper.
pub struct YoutubeTranscriber {
    http_client: reqwest::Client,
    openai: OpenAIClient,
    yt_dlp_path: PathBuf,
    ffmpeg_path: PathBuf,
    workdir: PathBuf,
}

impl YoutubeTranscriber {
    const WATCH_URL: &str = "https://www.youtube.com/watch";
    const TRANSCRIPTION_MODEL: &str = "whisper-1";
    /// Keeps each upload well under the transcription endpoint's size limit
    const CHUNK_DURATION_SECS: u64 = 15 * 60;

    pub fn new(openai: OpenAIClient, workdir: impl Into<PathBuf>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            openai,
            yt_dlp_path: PathBuf::from("yt-dlp"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            workdir: workdir.into(),
        }
    }

    pub fn with_yt_dlp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.yt_dlp_path = path.into();
        self
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    fn watch_url(video_id: &VideoId) -> String {
        format!("{}?v={}", Self::WATCH_URL, video_id)
    }

    /// Loads the watch page html
    #[tracing::instrument(skip(self))]
    async fn fetch_watch_page(&self, video_id: &VideoId) -> Result<WatchPage, TranscriptError> {
        let html = self
            .http_client
            .get(Self::watch_url(video_id))
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(html.into())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_caption_phrases(
        &self,
        video_id: &VideoId,
    ) -> Result<Vec<SpeechPhrase>, TranscriptError> {
        let page = self.fetch_watch_page(video_id).await?;
        let tracks = page.caption_tracks()?;
        let track =
            select_track(&tracks).ok_or_else(|| TranscriptError::NoCaptions(video_id.clone()))?;
        tracing::debug!(language = %track.language_code, kind = ?track.kind, "Selected caption track");

        let timed_text = self
            .http_client
            .get(track.json3_url())
            .send()
            .await?
            .error_for_status()?
            .json::<TimedText>()
            .await?;

        Ok(timed_text.into_phrases())
    }

    /// Downloads the audio track via `yt-dlp` into the work directory
    #[tracing::instrument(skip(self))]
    async fn download_audio(
        &self,
        video_id: &VideoId,
        base_name: &str,
    ) -> Result<PathBuf, TranscriptError> {
        let audio_output_template = self.workdir.join(format!("{base_name}.%(ext)s"));
        let audio_mp3_path = self.workdir.join(format!("{base_name}.mp3"));

        let output = Command::new(&self.yt_dlp_path)
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--audio-quality")
            .arg("9")
            .arg("-o")
            .arg(&audio_output_template)
            .arg(Self::watch_url(video_id))
            .output()
            .await
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to spawn yt-dlp"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(status = %output.status, %stderr, "Failed to download audio");
            return Err(TranscriptError::YtDlp(format!(
                "{}: {}",
                output.status,
                stderr.trim()
            )));
        }

        if !audio_mp3_path.exists() {
            return Err(TranscriptError::YtDlp(format!(
                "yt-dlp did not produce expected file: {}",
                audio_mp3_path.display()
            )));
        }

        Ok(audio_mp3_path)
    }

    /// Splits the audio into fixed length chunks small enough for a single
    /// transcription upload. Returns the chunk paths in playback order.
    #[tracing::instrument(skip(self))]
    async fn split_audio(
        &self,
        audio_path: &Path,
        base_name: &str,
    ) -> Result<Vec<PathBuf>, TranscriptError> {
        let chunk_pattern = self.workdir.join(format!("{base_name}{CHUNK_MARKER}%03d.mp3"));

        let output = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(audio_path)
            .args(["-f", "segment", "-segment_time"])
            .arg(Self::CHUNK_DURATION_SECS.to_string())
            .args(["-c", "copy"])
            .arg(&chunk_pattern)
            .output()
            .await
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to spawn ffmpeg"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(status = %output.status, %stderr, "Failed to split audio to chunks");
            return Err(TranscriptError::Ffmpeg(format!(
                "{}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let mut chunks = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.workdir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if is_chunk(&entry.file_name().to_string_lossy(), base_name) {
                chunks.push(entry.path());
            }
        }
        // zero padded indices sort in playback order
        chunks.sort();

        if chunks.is_empty() {
            return Err(TranscriptError::Ffmpeg(format!(
                "ffmpeg produced no chunks for {}",
                audio_path.display()
            )));
        }
        tracing::debug!(count = chunks.len(), "Split audio to chunks");

        Ok(chunks)
    }

    /// Downloads, chunks and transcribes the audio track. Every file written
    /// for this download is removed afterwards, whether or not it succeeded.
    #[tracing::instrument(skip(self))]
    async fn transcribe_audio(
        &self,
        video_id: &VideoId,
    ) -> Result<Vec<SpeechPhrase>, TranscriptError> {
        tokio::fs::create_dir_all(&self.workdir).await?;

        // concurrent requests for one video must not share files
        let base_name = format!(
            "{video_id}_{}",
            DOWNLOAD_SEQ.fetch_add(1, Ordering::Relaxed)
        );

        let result = self.transcribe_chunks(video_id, &base_name).await;
        remove_artifacts(&self.workdir, &base_name).await;

        result
    }

    async fn transcribe_chunks(
        &self,
        video_id: &VideoId,
        base_name: &str,
    ) -> Result<Vec<SpeechPhrase>, TranscriptError> {
        let audio_path = self.download_audio(video_id, base_name).await?;
        let chunks = self.split_audio(&audio_path, base_name).await?;

        let mut phrases = Vec::new();
        let mut time_offset = 0.0_f64;
        let mut previous_text: Option<String> = None;

        for chunk in &chunks {
            let prompt = previous_text.as_deref().map(prompt_tail);
            let response = self
                .openai
                .send_transcribe_request(chunk, Self::TRANSCRIPTION_MODEL, prompt)
                .await
                .inspect_err(|e| tracing::error!(error = %e, chunk = ?chunk, "Failed to transcribe audio"))?;

            phrases.extend(chunk_phrases(&response, time_offset));

            time_offset += if response.duration > 0.0 {
                response.duration
            } else {
                Self::CHUNK_DURATION_SECS as f64
            };
            previous_text = Some(response.text);
        }

        Ok(phrases)
    }
}

const CHUNK_MARKER: &str = "_chunk_";

/// Whisper only looks at the end of its prompt
const PROMPT_TAIL_CHARS: usize = 800;

fn is_chunk(file_name: &str, base_name: &str) -> bool {
    file_name
        .strip_prefix(base_name)
        .and_then(|rest| rest.strip_prefix(CHUNK_MARKER))
        .is_some_and(|rest| rest.ends_with(".mp3"))
}

/// Files written for one download: the yt-dlp output and its partial files,
/// plus the chunks split from it
fn is_artifact(file_name: &str, base_name: &str) -> bool {
    file_name
        .strip_prefix(base_name)
        .is_some_and(|rest| rest.starts_with('.') || rest.starts_with(CHUNK_MARKER))
}

async fn remove_artifacts(workdir: &Path, base_name: &str) {
    let mut entries = match tokio::fs::read_dir(workdir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = ?e, workdir = ?workdir, "Failed to list work directory");
            return;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = ?e, "Failed to list work directory");
                break;
            }
        };
        if !is_artifact(&entry.file_name().to_string_lossy(), base_name) {
            continue;
        }
        let path = entry.path();
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(error = ?e, path = ?path, "Failed to clean up audio file");
        }
    }
}

/// The end of the previous chunk's text, cut on a char boundary
fn prompt_tail(text: &str) -> String {
    let skip = text.chars().count().saturating_sub(PROMPT_TAIL_CHARS);
    text.chars().skip(skip).collect()
}

/// Maps one transcribed chunk to phrases on the timeline of the full audio.
/// A response without segments becomes a single phrase at the chunk start.
fn chunk_phrases(response: &TranscribeResponse, time_offset: f64) -> Vec<SpeechPhrase> {
    match response.segments {
        Some(ref segments) => segments
            .iter()
            .map(|seg| SpeechPhrase::new(seg.start + time_offset, seg.text.trim()))
            .filter(|phrase| !phrase.text.is_empty())
            .collect(),
        None => {
            let text = response.text.trim();
            if text.is_empty() {
                Vec::new()
            } else {
                vec![SpeechPhrase::new(time_offset, text)]
            }
        }
    }
}

impl TranscriptSource for YoutubeTranscriber {
    type Error = TranscriptError;

    async fn fetch_phrases(
        &self,
        video_id: &VideoId,
        mode: TranscriptMode,
    ) -> Result<Vec<SpeechPhrase>, Self::Error> {
        let phrases = match mode {
            TranscriptMode::Captions => self.fetch_caption_phrases(video_id).await?,
            TranscriptMode::Whisper => self.transcribe_audio(video_id).await?,
        };
        tracing::info!(%video_id, ?mode, count = phrases.len(), "Fetched transcript");

        Ok(phrases)
    }
}
