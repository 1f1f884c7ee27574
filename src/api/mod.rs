//! API module
//!
//! HTTP API endpoints and the state they share.

pub mod routes;

pub use routes::create_router;

use std::sync::Arc;

use axum::http::HeaderName;
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::dispatch::{EventBus, UserCleanupSubscriber};
use crate::event_store::Persistence;
use crate::handlers::{OrderHandler, ProjectHandler, UserHandler};

/// Handlers shared by every request
#[derive(Clone)]
pub struct AppState {
    pub users: UserHandler,
    pub projects: ProjectHandler,
    pub orders: OrderHandler,
}

impl AppState {
    /// Build the handlers on top of `persistence`, with an event bus carrying
    /// the user cleanup subscriber
    pub async fn wire(persistence: Persistence) -> Self {
        let bus = EventBus::new();
        let persistence = persistence.with_dispatcher(Arc::new(bus.clone()));

        let state = Self {
            users: UserHandler::new(persistence.clone()),
            projects: ProjectHandler::new(persistence.clone()),
            orders: OrderHandler::new(persistence),
        };

        bus.subscribe(Arc::new(UserCleanupSubscriber::new(state.projects.clone())))
            .await;

        state
    }
}

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Build the application router
///
/// Every request gets an `x-request-id` (kept if the client sent one), which
/// is echoed on the response.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", create_router())
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
