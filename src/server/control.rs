//! Control endpoints: message injection, health, stats, viewer page

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::stats::BrokerStats;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct InjectParams {
    pub msg: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `GET /msg?msg=...`
pub async fn inject_query(
    State(state): State<AppState>,
    Query(params): Query<InjectParams>,
) -> Response {
    inject(&state, Bytes::from(params.msg.unwrap_or_default())).await
}

/// `POST /msg` with the payload as the body
pub async fn inject_body(State(state): State<AppState>, body: Bytes) -> Response {
    inject(&state, body).await
}

async fn inject(state: &AppState, payload: Bytes) -> Response {
    if payload.is_empty() {
        return (StatusCode::BAD_REQUEST, "missing msg").into_response();
    }

    let len = payload.len();
    match state.broker.publish(payload).await {
        Ok(()) => {
            tracing::debug!(bytes = len, "Message injected");
            "Thanks".into_response()
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `GET /stats`
pub async fn stats(
    State(state): State<AppState>,
) -> Result<Json<BrokerStats>, (StatusCode, String)> {
    state
        .broker
        .stats()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

/// `GET /`
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Live logs</title>
  <style>
    body { font-family: monospace; margin: 1em; }
    #status { color: #666; }
    #log div { white-space: pre; border-bottom: 1px solid #eee; }
  </style>
</head>
<body>
  <p id="status">connecting...</p>
  <button id="ping">Send ping</button>
  <div id="log"></div>
  <script>
    const log = document.getElementById('log');
    const status = document.getElementById('status');
    const source = new EventSource('/event');

    source.onmessage = (e) => {
      const line = document.createElement('div');
      line.textContent = e.data;
      log.prepend(line);
    };
    source.addEventListener('joined', (e) => { status.textContent = e.data + ' watching'; });
    source.addEventListener('left', (e) => { status.textContent = e.data + ' watching'; });
    source.onerror = () => { status.textContent = 'disconnected'; };

    document.getElementById('ping').onclick = () => {
      fetch('/msg?msg=' + encodeURIComponent('ping ' + new Date().toISOString()));
    };
  </script>
</body>
</html>
"#;
