//! Axum HTTP handlers for the web server
//!
//! Provides the JSON-RPC endpoint, its SSE companion stream, and general metadata endpoints.

use std::{convert::Infallible, time::Duration};

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::{SecondsFormat, Utc};
use futures::Stream;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::mcp::rpc::{json_rpc_error, INTERNAL_ERROR};
use crate::mcp::server::handle_json_rpc_payload;
use crate::AppState;

pub const MCP_PATH: &str = "/sse";
const SSE_PING_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub mcp_endpoint: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

pub async fn discovery() -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        mcp_endpoint: MCP_PATH,
    })
}

pub async fn mcp_endpoint(State(state): State<AppState>, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return (
                StatusCode::OK,
                Json(json_rpc_error(None, INTERNAL_ERROR, "Parse error")),
            )
                .into_response()
        }
    };

    match handle_json_rpc_payload(&state, payload).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Server-to-client stream. Requests still arrive by POST on the same path;
/// this channel only announces the connection and then pings. The pings are
/// the keep-alive, so no comment frames are added.
pub async fn sse_stream() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(sse_events(SSE_PING_INTERVAL))
}

fn sse_events(ping_interval: Duration) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        yield Ok(Event::default()
            .event("connected")
            .data(json!({
                "status": "connected",
                "timestamp": Utc::now().to_rfc3339(),
            }).to_string()));

        let mut ticker = tokio::time::interval(ping_interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            debug!("sse ping");
            yield Ok(Event::default()
                .event("ping")
                .data(json!({ "timestamp": Utc::now().to_rfc3339() }).to_string()));
        }
    }
}
