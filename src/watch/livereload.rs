// src/watch/livereload.rs

//! Minimal LiveReload (protocol 7) server.
//!
//! - `GET /livereload` upgrades to a websocket, answers the `hello`
//!   handshake and pushes `reload` commands.
//! - `GET /changed?files=a.css,b.js` triggers a reload by hand.
//! - `GET /` returns a JSON banner.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::engine::ReloadSender;

pub const PROTOCOL_7: &str = "http://livereload.com/protocols/official-7";
const SERVER_NAME: &str = "buildwatch";

#[derive(Clone)]
struct LiveReloadState {
    tx: ReloadSender,
}

#[derive(Debug, Deserialize)]
struct ChangedQuery {
    files: Option<String>,
}

pub fn router(tx: ReloadSender) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/livereload", get(upgrade))
        .route("/changed", get(changed))
        .with_state(LiveReloadState { tx })
}

/// Bind `addr` and serve in the background; returns the bound address.
pub async fn spawn_server(addr: SocketAddr, tx: ReloadSender) -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding LiveReload server to {addr}"))?;
    let local = listener.local_addr()?;
    info!("LiveReload server listening on http://{local}");

    let app = router(tx);
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!(error = %err, "LiveReload server stopped");
        }
    });

    Ok(local)
}

async fn banner() -> Json<Value> {
    Json(json!({
        "buildwatch": "Welcome",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn changed(
    State(state): State<LiveReloadState>,
    Query(query): Query<ChangedQuery>,
) -> Json<Value> {
    let files: Vec<String> = query
        .files
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect();

    let clients = state.tx.receiver_count();
    if !files.is_empty() {
        let _ = state.tx.send(files.clone());
    }
    Json(json!({ "clients": clients, "files": files }))
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<LiveReloadState>) -> impl IntoResponse {
    let rx = state.tx.subscribe();
    ws.on_upgrade(move |socket| client(socket, rx))
}

async fn client(mut socket: WebSocket, mut rx: tokio::sync::broadcast::Receiver<Vec<String>>) {
    debug!("LiveReload client connected");
    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handshake_reply(&text) {
                        if socket.send(Message::Text(reply)).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            changed = rx.recv() => match changed {
                Ok(paths) => {
                    for path in paths {
                        if socket.send(Message::Text(reload_message(&path))).await.is_err() {
                            return;
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "LiveReload client lagging; reloads dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!("LiveReload client disconnected");
}

/// Reply to a client `hello`; other commands (`info`, ...) get none.
pub fn handshake_reply(text: &str) -> Option<String> {
    let msg: Value = serde_json::from_str(text).ok()?;
    if msg.get("command")?.as_str()? != "hello" {
        return None;
    }
    Some(
        json!({
            "command": "hello",
            "protocols": [PROTOCOL_7],
            "serverName": SERVER_NAME,
        })
        .to_string(),
    )
}

pub fn reload_message(path: &str) -> String {
    json!({ "command": "reload", "path": path, "liveCSS": true }).to_string()
}
