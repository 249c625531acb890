//! Collector HTTP routes

use std::fmt::Write as _;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use super::EventLog;
use crate::event::{PingStatus, SilencePing};

/// Ingestion errors
#[derive(Debug)]
pub enum IngestError {
    /// Payload parsed but breaks the field rules
    InvalidPayload(&'static str),
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::InvalidPayload(msg) => (StatusCode::BAD_REQUEST, "invalid_payload", msg.to_string()),
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}

/// JSON view of a log
#[derive(Serialize)]
pub struct EventsResponse {
    pub events: Vec<SilencePing>,
    pub count: usize,
}

impl From<Vec<SilencePing>> for EventsResponse {
    fn from(events: Vec<SilencePing>) -> Self {
        Self {
            count: events.len(),
            events,
        }
    }
}

async fn index() -> Html<&'static str> {
    Html(
        "Silence collector is running.<br>\
         POST silence events to /silence.<br>\
         Use /show_pings_text for real-time text data (newest first).<br>\
         Use /freeze_pings to take a snapshot, then /show_frozen_pings_text to see it.<br>\
         JSON views are at /events and /events/frozen.",
    )
}

async fn ingest(
    State(log): State<Arc<EventLog>>,
    Json(ping): Json<SilencePing>,
) -> Result<&'static str, IngestError> {
    ping.validate().map_err(|reason| {
        tracing::warn!(reason, status = ?ping.status, "rejected silence ping");
        IngestError::InvalidPayload(reason)
    })?;

    tracing::info!(
        status = ?ping.status,
        start_time = %ping.start_time,
        end_time = ?ping.end_time,
        duration = ?ping.duration,
        "received ping"
    );
    log.record(ping).await;

    Ok("Silence event recorded")
}

async fn show_pings_text(State(log): State<Arc<EventLog>>) -> Html<String> {
    Html(render_text(
        "REAL-TIME SILENCE DATA (NEWEST FIRST):",
        &log.newest_first().await,
    ))
}

async fn freeze_pings(State(log): State<Arc<EventLog>>) -> &'static str {
    let count = log.freeze().await;
    tracing::info!(count, "data has been frozen");
    "Data has been frozen. Visit /show_frozen_pings_text to see the snapshot."
}

async fn show_frozen_pings_text(State(log): State<Arc<EventLog>>) -> Html<String> {
    Html(render_text(
        "FROZEN SILENCE DATA (NEWEST FIRST):",
        &log.frozen_newest_first().await,
    ))
}

async fn events(State(log): State<Arc<EventLog>>) -> Json<EventsResponse> {
    Json(log.newest_first().await.into())
}

async fn frozen_events(State(log): State<Arc<EventLog>>) -> Json<EventsResponse> {
    Json(log.frozen_newest_first().await.into())
}

/// Render pings as a `<pre>` block, one entry per ping
#[must_use]
pub fn render_text(heading: &str, pings: &[SilencePing]) -> String {
    let mut out = String::from("<pre>");
    let _ = writeln!(out, "{heading}");

    for ping in pings {
        out.push('\n');
        match ping.status {
            PingStatus::SilenceStart => {
                let _ = write!(out, "Silence START at {}", ping.start_time);
            }
            PingStatus::SilenceEnd => {
                let end = ping.end_time.as_deref().unwrap_or("N/A");
                let duration = ping
                    .duration
                    .map_or_else(|| "N/A".to_string(), |d| format!("{d:?}"));
                let _ = write!(
                    out,
                    "Silence END at {end}\n  Started: {}\n  Duration: {duration} seconds",
                    ping.start_time
                );
            }
        }
        out.push_str("\n---");
    }

    out.push_str("</pre>");
    out
}

/// Build the collector router
pub fn router(log: Arc<EventLog>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/silence", post(ingest))
        .route("/show_pings_text", get(show_pings_text))
        .route("/freeze_pings", get(freeze_pings).post(freeze_pings))
        .route("/show_frozen_pings_text", get(show_frozen_pings_text))
        .route("/events", get(events))
        .route("/events/frozen", get(frozen_events))
        .with_state(log)
}
