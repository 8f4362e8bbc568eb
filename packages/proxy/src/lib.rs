// ABOUTME: Reverse-proxy surface for Warren workspaces
// ABOUTME: HTTP pass-through and WebSocket piping with boundary error translation

pub mod error;
pub mod http;
pub mod ws;

use axum::Router;

pub use error::{close_codes, status_for};
pub use http::{preview_router, PreviewStatusResponse, ProxyContext};
pub use ws::{valid_workspace_id, ws_router};

/// Combined proxy surface: `/preview/...` and `/ws/...`.
pub fn router(ctx: ProxyContext) -> Router {
    preview_router(ctx.clone()).merge(ws_router(ctx))
}
