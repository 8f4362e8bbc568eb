// ABOUTME: Boundary translation from workspace errors to HTTP statuses and WS close codes
// ABOUTME: External clients get a meaningful signal without internal error types leaking

use axum::http::StatusCode;
use warren_engine::EngineError;
use warren_workspaces::WorkspaceError;

/// WebSocket close codes in the application range, one per failure class so
/// clients can tell "workspace gone" from "target unreachable".
pub mod close_codes {
    /// The upstream target URI could not be constructed or parsed
    pub const INVALID_TARGET: u16 = 4400;
    /// TCP connection to the workspace port was refused or unroutable
    pub const UPSTREAM_UNREACHABLE: u16 = 4502;
    /// TCP worked but the WebSocket handshake was rejected
    pub const HANDSHAKE_FAILED: u16 = 4503;
    /// Anything else
    pub const INTERNAL: u16 = 4500;
}

/// Map a workspace error to the status the proxy surface answers with.
///
/// Workspace or route absent maps to 404, a workspace that exists but is not
/// running to 503, unreachable upstream to 502, slow upstream to 504, and
/// everything else to 500.
pub fn status_for(error: &WorkspaceError) -> StatusCode {
    match error {
        WorkspaceError::NotFound(_) | WorkspaceError::HostNotFound(_) => StatusCode::NOT_FOUND,
        WorkspaceError::Driver(EngineError::NotFound(_)) => StatusCode::NOT_FOUND,
        WorkspaceError::NotRunning(_) => StatusCode::SERVICE_UNAVAILABLE,
        WorkspaceError::CapacityExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
        WorkspaceError::UpstreamConnection(_) => StatusCode::BAD_GATEWAY,
        WorkspaceError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        WorkspaceError::Driver(EngineError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        WorkspaceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
