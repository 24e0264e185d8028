//! HTTP surface of the summary pipeline

use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::post,
    Json, Router,
};
use futures::{Stream, StreamExt, TryStreamExt};
use summary_datastore::DataStore;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    coordinator::{Encoding, FrameStream, WireFrame},
    yt::TranscriptSource,
    CompletionClient, Credential, Error, Pipeline, ShortenRequest, SummaryRequest,
};

pub fn router<T, C, D>(pipeline: Arc<Pipeline<T, C, D>>) -> Router
where
    T: TranscriptSource + Send + Sync + 'static,
    C: CompletionClient + Send + Sync + 'static,
    D: DataStore + Send + Sync + 'static,
{
    Router::new()
        .route("/youtube_markdown", post(youtube_markdown::<T, C, D>))
        .route("/shorten_markdown", post(shorten_markdown::<T, C, D>))
        .route("/check", post(check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

async fn youtube_markdown<T, C, D>(
    State(pipeline): State<Arc<Pipeline<T, C, D>>>,
    headers: HeaderMap,
    Json(request): Json<SummaryRequest>,
) -> Result<Response, Error>
where
    T: TranscriptSource + Send + Sync + 'static,
    C: CompletionClient + Send + Sync + 'static,
    D: DataStore + Send + Sync + 'static,
{
    let credential = credential_from_headers(&headers);
    let encoding = Encoding::from_sse_flag(request.use_sse);

    let frames = pipeline
        .summary_stream(request, credential, CancellationToken::new())
        .await?;

    Ok(stream_response(frames, encoding))
}

async fn shorten_markdown<T, C, D>(
    State(pipeline): State<Arc<Pipeline<T, C, D>>>,
    headers: HeaderMap,
    Json(request): Json<ShortenRequest>,
) -> Result<Response, Error>
where
    T: TranscriptSource + Send + Sync + 'static,
    C: CompletionClient + Send + Sync + 'static,
    D: DataStore + Send + Sync + 'static,
{
    let credential = credential_from_headers(&headers);
    let encoding = Encoding::from_sse_flag(request.use_sse);

    let frames = pipeline
        .shorten_stream(request, credential, CancellationToken::new())
        .await?;

    Ok(stream_response(frames, encoding))
}

async fn check() -> &'static str {
    "ok"
}

fn credential_from_headers(headers: &HeaderMap) -> Option<Credential> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(Credential::from_authorization)
}

/// Frames are pulled only while the response body is alive. A dropped
/// connection drops the body and with it the run, which abandons the stream.
fn stream_response(frames: FrameStream, encoding: Encoding) -> Response {
    match encoding {
        Encoding::Raw => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            Body::from_stream(frames.map_ok(|frame| frame.into_payload())),
        )
            .into_response(),
        Encoding::EventStream => Sse::new(sse_events(frames)).into_response(),
    }
}

fn sse_events(
    frames: impl Stream<Item = Result<WireFrame, Error>> + Send + 'static,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    // an upstream failure ends the event stream after an error event
    frames
        .map(|frame| match frame {
            Ok(frame) => Event::default().data(frame.into_payload()),
            Err(e) => Event::default()
                .event("error")
                .data(serde_json::json!({ "error": e.to_string() }).to_string()),
        })
        .map(Ok)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            Error::Transcript(_) | Error::Completion(_) => StatusCode::BAD_GATEWAY,
            Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
