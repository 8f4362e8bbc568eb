// ABOUTME: Workspace management REST surface for Warren
// ABOUTME: Routes the owner-scoped lifecycle endpoints onto a workspace backend

use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub mod handlers;
pub mod response;

pub use handlers::{ApiState, USER_HEADER};
pub use response::ApiResponse;

/// Creates the workspace management router.
pub fn workspaces_router(state: ApiState) -> Router {
    Router::new()
        .route("/workspaces", post(handlers::create_workspace))
        .route("/workspaces", get(handlers::list_workspaces))
        .route("/workspaces/{id}", get(handlers::get_workspace))
        .route("/workspaces/{id}", delete(handlers::delete_workspace))
        .route("/workspaces/{id}/stop", post(handlers::stop_workspace))
        .route("/workspaces/{id}/exec", post(handlers::exec_command))
        .route("/workspaces/{id}/heartbeat", post(handlers::heartbeat))
        .route("/workspaces/{id}/stats", get(handlers::workspace_stats))
        .route("/workspaces/{id}/files", get(handlers::read_file))
        .route("/workspaces/{id}/files", put(handlers::write_file))
        .route("/workspaces/{id}/files/list", get(handlers::list_files))
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
