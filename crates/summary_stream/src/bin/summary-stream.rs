use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use summary_datastore::PgDataStore;
use summary_stream::{
    openai::OpenAIClient, server::router, tracing::init_tracing_subscriber,
    yt::transcriber::YoutubeTranscriber, PipelineBuilder,
};

#[derive(Parser)]
#[command(
    name = "summary-stream",
    about = "Streams timestamped markdown study guides of YouTube videos"
)]
struct Cli {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Default OpenAI API key, used when a request carries no bearer token
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_key: String,

    /// OpenAI compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,

    /// Chat completion model
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    openai_model: String,

    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    bind_addr: SocketAddr,

    /// Maximum completions in flight across all requests
    #[arg(long, env = "MAX_CONCURRENT_COMPLETIONS")]
    max_concurrent_completions: Option<usize>,

    /// Maximum transcript characters per summarized segment
    #[arg(long, env = "SEGMENT_MAX_LENGTH", default_value = "300")]
    segment_max_length: usize,

    /// Working directory for downloaded audio
    #[arg(long, env = "WORKDIR", default_value = "/var/tmp/summary-stream")]
    workdir: PathBuf,

    /// Path to the yt-dlp binary
    #[arg(long, env = "YTDLP_PATH", default_value = "yt-dlp")]
    yt_dlp_path: PathBuf,

    /// Path to the ffmpeg binary, used to chunk long audio for whisper
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    ffmpeg_path: PathBuf,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let _guard = sentry::init((
        std::env::var("SENTRY_DSN").unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some("production".into()),
            ..Default::default()
        },
    ));

    let cli = Cli::parse();
    init_tracing_subscriber()?;

    let store = PgDataStore::init(&cli.database_url).await?;

    //XXX: the client serves both whisper transcription and summarization
    let openai = OpenAIClient::new(&cli.openai_key)
        .with_base_url(&cli.openai_base_url)
        .with_model(&cli.openai_model);
    let transcriber = YoutubeTranscriber::new(openai.clone(), &cli.workdir)
        .with_yt_dlp_path(&cli.yt_dlp_path)
        .with_ffmpeg_path(&cli.ffmpeg_path);

    let mut builder = PipelineBuilder::new()
        .transcriber(transcriber)
        .completion_client(openai)
        .store(store)
        .segment_max_length(cli.segment_max_length);
    if let Some(permits) = cli.max_concurrent_completions {
        builder = builder.max_concurrent_completions(permits);
    }
    let pipeline = Arc::new(builder.build());

    let listener = tokio::net::TcpListener::bind(cli.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind_addr))?;
    tracing::info!(addr = %cli.bind_addr, "Listening");

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}
