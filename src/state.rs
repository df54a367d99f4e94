use std::sync::Arc;

use sqlx::SqlitePool;

use crate::services::{OptimisticCoordinator, OverviewService};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub coordinator: Arc<OptimisticCoordinator>,
    pub overview: OverviewService,
}
