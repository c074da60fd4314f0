use std::sync::Arc;

use dealflow_workflow::WorkflowService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, used directly by the partner and
    /// notification handlers.
    pub pool: dealflow_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Deal workflow operations (mutators, release gate, scoring). Owns
    /// the event bus.
    pub workflow: WorkflowService,
}
