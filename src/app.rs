use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{AppConfig, StoreBackend};
use crate::service::{LoggingService, StoreService};
use crate::storage::{FileSubmissionStore, SqlSubmissionStore, SubmissionStore};

/// Opens and initializes the store selected by `config`.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn SubmissionStore>> {
    let store: Arc<dyn SubmissionStore> = match config.backend {
        StoreBackend::File => {
            let path = config.submissions_path();
            info!(path = %path.display(), "store backend: file");
            Arc::new(FileSubmissionStore::new(path))
        }
        StoreBackend::Sqlite => {
            info!(url = %config.database_url, "store backend: sqlite");
            let store = SqlSubmissionStore::connect(&config.database_url, config.db_max_connections)
                .await
                .context("failed to connect to submissions database")?;
            Arc::new(store)
        }
    };

    store
        .initialize()
        .await
        .context("failed to initialize submission store")?;

    Ok(store)
}

/// The service stack used by front ends: validation wrapped in logging.
pub fn build_service(store: Arc<dyn SubmissionStore>) -> LoggingService<StoreService> {
    LoggingService::new(StoreService::new(store))
}
