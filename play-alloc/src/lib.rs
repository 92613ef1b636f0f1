//! play-alloc library interface
//!
//! Audio allocation for listening surveys: parses question codes, rotates
//! sessions across a survey's audio subfolders, picks files without repeats
//! inside a session, and keeps a catalog and audit log of the audio pool.

pub mod api;
pub mod code;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pool;
pub mod services;
pub mod session;
pub mod store;

pub use crate::error::{AllocError, ApiError, ApiResult};
pub use crate::services::Allocator;

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::session::SessionRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub allocator: Allocator,
    /// Live session contexts
    pub sessions: Arc<SessionRegistry>,
    /// Host question types the render hook applies to
    pub allowed_question_types: Arc<Vec<String>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last allocation error, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(allocator: Allocator, allowed_question_types: Vec<String>) -> Self {
        Self {
            allocator,
            sessions: Arc::new(SessionRegistry::new()),
            allowed_question_types: Arc::new(allowed_question_types),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Use a registry with configured timeouts
    pub fn with_sessions(mut self, sessions: SessionRegistry) -> Self {
        self.sessions = Arc::new(sessions);
        self
    }

    /// Whether the render hook applies to a host question type
    pub fn allows_question_type(&self, question_type: &str) -> bool {
        self.allowed_question_types.iter().any(|t| t == question_type)
    }

    pub async fn record_error(&self, message: String) {
        *self.last_error.write().await = Some(message);
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::hook_routes())
        .merge(api::audit_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
