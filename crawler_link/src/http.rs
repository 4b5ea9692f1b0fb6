//! HTTP control adapter.
//!
//! REST surface over axum:
//!
//! | Method | Path       | Body                                  | Response |
//! |--------|------------|---------------------------------------|----------|
//! | POST   | `/control` | `{throttle?, steering?, slow_mode?}`  | `{"status":"ok"}` |
//! | POST   | `/estop`   | -                                     | `{"status":"estop"}` |
//! | POST   | `/arm`     | -                                     | `{"status":"armed"}` |
//! | GET    | `/status`  | -                                     | `{"armed":bool,"source":int}` |
//! | GET    | `/`        | -                                     | HTML control page |
//!
//! `source` uses the stable [`ControlSource`] integer encoding.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::State;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crawler_common::frame::{ControlFrame, ControlSource, clamp_unit, monotonic_ms};
use crawler_control::{ControlManager, SafetyMonitor};

/// Shared state for the HTTP handlers.
pub struct HttpState {
    pub manager: Arc<ControlManager>,
    pub safety: Arc<SafetyMonitor>,
}

#[derive(Debug, Default, Deserialize)]
struct ControlRequest {
    throttle: Option<f32>,
    steering: Option<f32>,
    slow_mode: Option<bool>,
}

#[derive(Debug, Serialize)]
struct StatusMessage {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    armed: bool,
    source: u8,
}

async fn control(
    State(state): State<Arc<HttpState>>,
    Json(request): Json<ControlRequest>,
) -> Json<StatusMessage> {
    let frame = ControlFrame {
        throttle: clamp_unit(request.throttle.unwrap_or(0.0)),
        steering: clamp_unit(request.steering.unwrap_or(0.0)),
        slow_mode: request.slow_mode.unwrap_or(false),
        timestamp: monotonic_ms(),
        ..ControlFrame::default()
    };
    state.manager.submit(ControlSource::Http, &frame);
    Json(StatusMessage { status: "ok" })
}

async fn estop(State(state): State<Arc<HttpState>>) -> Json<StatusMessage> {
    let frame = ControlFrame {
        estop: true,
        timestamp: monotonic_ms(),
        ..ControlFrame::default()
    };
    state.manager.submit(ControlSource::Http, &frame);
    Json(StatusMessage { status: "estop" })
}

async fn arm(State(state): State<Arc<HttpState>>) -> Json<StatusMessage> {
    let frame = ControlFrame {
        arm: true,
        timestamp: monotonic_ms(),
        ..ControlFrame::default()
    };
    state.manager.submit(ControlSource::Http, &frame);
    Json(StatusMessage { status: "armed" })
}

async fn status(State(state): State<Arc<HttpState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        armed: state.safety.is_armed(),
        source: state.manager.active_source() as u8,
    })
}

async fn index() -> Html<&'static str> {
    Html(CONTROL_PAGE)
}

/// Build the adapter router.
pub fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/control", post(control))
        .route("/estop", post(estop))
        .route("/arm", post(arm))
        .route("/status", get(status))
        .route("/", get(index))
        .with_state(state)
}

/// Bind and serve until the shutdown flag flips.
pub async fn serve(
    state: Arc<HttpState>,
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http adapter listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
}

async fn wait_for_shutdown(shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}

/// Embedded operator page. Opaque to the core; note that ARM doubles
/// as the e-stop release.
const CONTROL_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Crawler Control</title>
<style>
body{font-family:sans-serif;text-align:center;padding:20px;}
button{padding:20px;margin:10px;font-size:18px;}
#estop{background:#c0392b;color:#fff;}
small{color:#666;}
</style></head><body>
<h1>Crawler Control</h1>
<p id="state">state: ?</p>
<button onclick="fetch('/arm',{method:'POST'})">ARM</button>
<button id="estop" onclick="fetch('/estop',{method:'POST'})">E-STOP</button>
<p><small>ARM also clears a latched E-STOP.</small></p>
<h2>Manual Control</h2>
<p>Throttle: <input id="t" type="range" min="-100" max="100" value="0"></p>
<p>Steering: <input id="s" type="range" min="-100" max="100" value="0"></p>
<label><input id="slow" type="checkbox"> slow mode</label>
<br><button onclick="send()">Send</button>
<script>
function send(){
  fetch('/control',{method:'POST',headers:{'Content-Type':'application/json'},
    body:JSON.stringify({
      throttle:parseInt(document.getElementById('t').value)/100,
      steering:parseInt(document.getElementById('s').value)/100,
      slow_mode:document.getElementById('slow').checked})});
}
setInterval(async()=>{
  const r=await fetch('/status');const j=await r.json();
  document.getElementById('state').textContent=
    'state: '+(j.armed?'ARMED':'not armed')+' | source '+j.source;
},1000);
</script>
</body></html>
"#;

// ─── Tests ──────────────────────────────────────────────────────────
