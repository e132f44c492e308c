use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    rendering::RenderingGateway,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub renderer: Arc<dyn RenderingGateway>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, renderer: Arc<dyn RenderingGateway>) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            renderer,
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::storage_unavailable(format!("database pool error: {err}")))
    }
}
