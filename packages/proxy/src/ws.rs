// ABOUTME: WebSocket reverse proxy piping client connections to workspace ports
// ABOUTME: Two concurrent pump loops; when either ends the other is cancelled

use axum::{
    extract::{
        ws::{CloseFrame, Message as ClientMessage, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as UpstreamCloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as UpstreamMessage};
use tracing::{debug, info, warn};

use warren_workspaces::WorkspaceStatus;

use crate::error::{close_codes, status_for};
use crate::http::ProxyContext;

/// Routes for the WebSocket proxy surface.
pub fn ws_router(ctx: ProxyContext) -> Router {
    Router::new()
        .route("/ws/{workspace_id}/{port}", get(ws_root))
        .route("/ws/{workspace_id}/{port}/{*path}", get(ws_path))
        .with_state(ctx)
}

/// Workspace ids are UUIDs or discovery-adopted names; anything outside a
/// conservative charset is rejected before touching the registry.
pub fn valid_workspace_id(workspace_id: &str) -> bool {
    !workspace_id.is_empty()
        && workspace_id.len() <= 64
        && workspace_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

async fn ws_root(
    State(ctx): State<ProxyContext>,
    Path((workspace_id, port)): Path<(String, u16)>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(ctx, workspace_id, port, None, ws).await
}

async fn ws_path(
    State(ctx): State<ProxyContext>,
    Path((workspace_id, port, path)): Path<(String, u16, String)>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(ctx, workspace_id, port, Some(path), ws).await
}

async fn upgrade(
    ctx: ProxyContext,
    workspace_id: String,
    port: u16,
    path: Option<String>,
    ws: WebSocketUpgrade,
) -> Response {
    if !valid_workspace_id(&workspace_id) {
        return StatusCode::BAD_REQUEST.into_response();
    }

    // Resolve before upgrading so plain HTTP clients get plain HTTP errors
    let workspace = match ctx.backend.get_workspace(&workspace_id).await {
        Ok(workspace) => workspace,
        Err(e) => return status_for(&e).into_response(),
    };
    if workspace.status != WorkspaceStatus::Running {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let Some(upstream_host) = workspace.proxy_host else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let target = match path {
        Some(path) => format!(
            "ws://{}:{}/{}",
            upstream_host,
            port,
            path.trim_start_matches('/')
        ),
        None => format!("ws://{}:{}", upstream_host, port),
    };

    info!(workspace = %workspace_id, target = %target, "WebSocket proxy connecting");
    ws.on_upgrade(move |socket| pipe(socket, workspace_id, target))
}

async fn pipe(client: WebSocket, workspace_id: String, target: String) {
    let upstream = match connect_async(&target).await {
        Ok((upstream, _)) => upstream,
        Err(e) => {
            let (code, reason) = classify_dial_error(&e);
            warn!(workspace = %workspace_id, target = %target, error = %e, "Upstream dial failed");
            close_client(client, code, reason).await;
            return;
        }
    };

    let (mut upstream_tx, mut upstream_rx) = upstream.split();
    let (mut client_tx, mut client_rx) = client.split();

    let mut client_to_upstream = tokio::spawn(async move {
        while let Some(message) = client_rx.next().await {
            let message = match message {
                Ok(message) => message,
                Err(_) => break,
            };
            let is_close = matches!(message, ClientMessage::Close(_));
            if upstream_tx.send(to_upstream(message)).await.is_err() {
                break;
            }
            if is_close {
                break;
            }
        }
        // Pass the disconnect through so the dev server sees a clean close
        let _ = upstream_tx.close().await;
    });

    let mut upstream_to_client = tokio::spawn(async move {
        while let Some(message) = upstream_rx.next().await {
            let message = match message {
                Ok(message) => message,
                Err(_) => break,
            };
            let Some(converted) = to_client(message) else {
                continue;
            };
            let is_close = matches!(converted, ClientMessage::Close(_));
            if client_tx.send(converted).await.is_err() {
                break;
            }
            if is_close {
                break;
            }
        }
        let _ = client_tx.close().await;
    });

    // When either pump ends, cancel the other so no upstream connection
    // outlives its client.
    tokio::select! {
        _ = &mut client_to_upstream => upstream_to_client.abort(),
        _ = &mut upstream_to_client => client_to_upstream.abort(),
    }
    debug!(workspace = %workspace_id, "WebSocket proxy closed");
}

fn classify_dial_error(error: &WsError) -> (u16, &'static str) {
    match error {
        WsError::Url(_) => (close_codes::INVALID_TARGET, "invalid proxy target"),
        WsError::Io(_) => (close_codes::UPSTREAM_UNREACHABLE, "workspace port unreachable"),
        WsError::Http(_) | WsError::Protocol(_) => {
            (close_codes::HANDSHAKE_FAILED, "upstream rejected websocket")
        }
        _ => (close_codes::INTERNAL, "proxy failure"),
    }
}

async fn close_client(mut client: WebSocket, code: u16, reason: &str) {
    let _ = client
        .send(ClientMessage::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })))
        .await;
}

fn to_upstream(message: ClientMessage) -> UpstreamMessage {
    match message {
        ClientMessage::Text(text) => UpstreamMessage::Text(text.as_str().to_owned()),
        ClientMessage::Binary(data) => UpstreamMessage::Binary(data.to_vec()),
        ClientMessage::Ping(data) => UpstreamMessage::Ping(data.to_vec()),
        ClientMessage::Pong(data) => UpstreamMessage::Pong(data.to_vec()),
        ClientMessage::Close(frame) => UpstreamMessage::Close(frame.map(|f| UpstreamCloseFrame {
            code: f.code.into(),
            reason: f.reason.to_string().into(),
        })),
    }
}

fn to_client(message: UpstreamMessage) -> Option<ClientMessage> {
    match message {
        UpstreamMessage::Text(text) => Some(ClientMessage::Text(text.into())),
        UpstreamMessage::Binary(data) => Some(ClientMessage::Binary(data.into())),
        UpstreamMessage::Ping(data) => Some(ClientMessage::Ping(data.into())),
        UpstreamMessage::Pong(data) => Some(ClientMessage::Pong(data.into())),
        UpstreamMessage::Close(frame) => Some(ClientMessage::Close(frame.map(|f| CloseFrame {
            code: f.code.into(),
            reason: f.reason.to_string().into(),
        }))),
        // Raw frames never cross the proxy
        UpstreamMessage::Frame(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_id_validation() {
        assert!(valid_workspace_id(
            "8f14e45f-ceea-4678-b171-9e94ccd1b1b1"
        ));
        assert!(valid_workspace_id("ws_recovered-1"));
        assert!(!valid_workspace_id(""));
        assert!(!valid_workspace_id("has space"));
        assert!(!valid_workspace_id("path/../escape"));
        assert!(!valid_workspace_id(&"x".repeat(65)));
    }

    #[test]
    fn dial_errors_map_to_distinct_close_codes() {
        let io = WsError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert_eq!(classify_dial_error(&io).0, close_codes::UPSTREAM_UNREACHABLE);

        let url = WsError::Url(tokio_tungstenite::tungstenite::error::UrlError::EmptyHostName);
        assert_eq!(classify_dial_error(&url).0, close_codes::INVALID_TARGET);
    }
}
