//! HTTP interrupt receiver.
//!
//! Small axum server that hardware (the motion sensor, peripheral firmware)
//! POSTs events to. Every accepted event becomes an [`Interrupt`] on the
//! bounded channel; the receiver itself never touches hub state, so the
//! producer side stays responsive no matter what the main loop is doing.
//! A full queue answers 503 and drops the event.

use crate::error::{HubError, Result};
use crate::interrupt::{Interrupt, InterruptChannel, InterruptKind};
use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone)]
struct ReceiverState {
    channel: InterruptChannel,
}

/// Bind and run the receiver until the token is cancelled.
pub async fn run_receiver(
    host: &str,
    port: u16,
    channel: InterruptChannel,
    cancel: CancellationToken,
) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HubError::Transport(format!("cannot bind receiver on {addr}: {e}")))?;
    serve_on(listener, channel, cancel).await
}

/// Run the receiver on an already-bound listener. Split out so tests can
/// bind port 0 and learn the assigned address first.
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    channel: InterruptChannel,
    cancel: CancellationToken,
) -> Result<()> {
    let local_addr = listener
        .local_addr()
        .map_err(|e| HubError::Transport(format!("receiver address unavailable: {e}")))?;

    let state = ReceiverState { channel };
    let app = axum::Router::new()
        .route("/health", get(health))
        .route("/motion", post(motion_alert))
        .route("/device_status", post(device_status))
        .route("/interrupt/clear", post(clear_interrupts))
        .with_state(state);

    info!("interrupt receiver listening on http://{local_addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await
    .map_err(|e| HubError::Transport(format!("receiver failed: {e}")))?;

    info!("interrupt receiver stopped");
    Ok(())
}

/// Flatten a JSON object body into the interrupt's string payload map.
fn flatten_payload(body: &serde_json::Value) -> HashMap<String, String> {
    let mut payload = HashMap::new();
    if let Some(object) = body.as_object() {
        for (key, value) in object {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            payload.insert(key.clone(), rendered);
        }
    }
    payload
}

async fn health(State(state): State<ReceiverState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "iris-hub",
        "queue_depth": state.channel.len(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn motion_alert(
    State(state): State<ReceiverState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    body: Option<Json<serde_json::Value>>,
) -> impl IntoResponse {
    let payload = body.map(|Json(b)| flatten_payload(&b)).unwrap_or_default();
    let interrupt = Interrupt::new(InterruptKind::Motion, payload, Some(remote));

    if state.channel.push(interrupt) {
        info!("motion alert from {remote}");
        (
            StatusCode::OK,
            Json(serde_json::json!({"received": true, "status": "queued"})),
        )
    } else {
        warn!("failed to queue motion alert from {remote}");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"received": false, "status": "queue_full"})),
        )
    }
}

async fn device_status(
    State(state): State<ReceiverState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let status = body.get("status").and_then(serde_json::Value::as_str);
    let kind = match status {
        Some("online") => InterruptKind::DeviceOnline,
        Some("offline") => InterruptKind::DeviceOffline,
        other => {
            warn!("unknown device status from {remote}: {other:?}");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"received": false, "error": "unknown status"})),
            );
        }
    };

    let interrupt = Interrupt::new(kind, flatten_payload(&body), Some(remote));
    if state.channel.push(interrupt) {
        (StatusCode::OK, Json(serde_json::json!({"received": true})))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"received": false, "status": "queue_full"})),
        )
    }
}

async fn clear_interrupts(State(state): State<ReceiverState>) -> impl IntoResponse {
    let cleared = state.channel.drain();
    Json(serde_json::json!({"cleared": cleared}))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    async fn start() -> (String, InterruptChannel, CancellationToken) {
        let channel = InterruptChannel::new(2);
        let cancel = CancellationToken::new();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_channel = channel.clone();
        let server_cancel = cancel.clone();
        tokio::spawn(async move {
            serve_on(listener, server_channel, server_cancel).await.unwrap();
        });
        (format!("http://{addr}"), channel, cancel)
    }

    #[tokio::test]
    async fn motion_post_queues_an_interrupt() {
        let (base, channel, cancel) = start().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/motion"))
            .json(&serde_json::json!({"sensor": "pir-1"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let interrupt = channel.poll().unwrap();
        assert_eq!(interrupt.kind, InterruptKind::Motion);
        assert_eq!(interrupt.payload.get("sensor").map(String::as_str), Some("pir-1"));
        assert!(interrupt.source.is_some());
        cancel.cancel();
    }

    #[tokio::test]
    async fn full_queue_answers_503() {
        let (base, channel, cancel) = start().await;
        let client = reqwest::Client::new();

        for _ in 0..2 {
            let response = client.post(format!("{base}/motion")).send().await.unwrap();
            assert_eq!(response.status(), 200);
        }
        let response = client.post(format!("{base}/motion")).send().await.unwrap();
        assert_eq!(response.status(), 503);
        assert_eq!(channel.len(), 2);
        cancel.cancel();
    }

    #[tokio::test]
    async fn device_status_maps_to_kind() {
        let (base, channel, cancel) = start().await;
        let client = reqwest::Client::new();

        client
            .post(format!("{base}/device_status"))
            .json(&serde_json::json!({"type": "light", "status": "offline"}))
            .send()
            .await
            .unwrap();
        let interrupt = channel.poll().unwrap();
        assert_eq!(interrupt.kind, InterruptKind::DeviceOffline);
        assert_eq!(interrupt.payload.get("type").map(String::as_str), Some("light"));

        let response = client
            .post(format!("{base}/device_status"))
            .json(&serde_json::json!({"type": "light", "status": "sideways"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        cancel.cancel();
    }

    #[tokio::test]
    async fn health_reports_queue_depth() {
        let (base, channel, cancel) = start().await;
        channel.push(Interrupt::new(InterruptKind::Motion, HashMap::new(), None));

        let body: serde_json::Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["queue_depth"], 1);
        cancel.cancel();
    }

    #[tokio::test]
    async fn clear_drains_the_queue() {
        let (base, channel, cancel) = start().await;
        channel.push(Interrupt::new(InterruptKind::Motion, HashMap::new(), None));
        channel.push(Interrupt::new(InterruptKind::Motion, HashMap::new(), None));

        let client = reqwest::Client::new();
        let body: serde_json::Value = client
            .post(format!("{base}/interrupt/clear"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["cleared"], 2);
        assert!(channel.is_empty());
        cancel.cancel();
    }
}
