pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod store;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::db::SqliteStore;
use crate::engine::AlertThresholds;
use crate::services::{OptimisticCoordinator, OverviewService};
use crate::state::AppState;
use crate::store::TopicStore;

/// Wires the SQLite store into the coordinator and overview service.
pub fn build_state(db: SqlitePool, thresholds: AlertThresholds) -> AppState {
    let store: Arc<dyn TopicStore> = Arc::new(SqliteStore::new(db.clone()));
    AppState {
        db,
        coordinator: Arc::new(OptimisticCoordinator::new(store.clone())),
        overview: OverviewService::new(store, thresholds),
    }
}
