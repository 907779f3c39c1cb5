use axum::Router;

pub mod node_templates;
pub mod outbox;
pub mod system;
pub mod workflows;

/// Router for all `/api/v1` endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/workflows", workflows::router())
        .nest("/node-templates", node_templates::router())
        .nest("/outbox", outbox::router())
}
