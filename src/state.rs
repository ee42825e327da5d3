use std::sync::Arc;

use crate::cancel::CancellationCoordinator;
use crate::catalog::CatalogClient;
use crate::config::AppConfig;
use crate::error::ClientResult;
use crate::metrics::TransferMetrics;
use crate::request::HostClient;
use crate::session::SessionContext;
use crate::store::SessionStore;
use crate::transfer::Downloader;

/// The shared client state.
///
/// Built once at startup and handed by reference (or clone) to whatever
/// needs the session, the catalog or the cancel hook. Nothing in the crate
/// reaches for a global.
#[derive(Clone)]
pub struct AppState {
    /// The SQLite pool backing the session history.
    pub db: sqlx::SqlitePool,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// Current session and its subscribers.
    pub session: SessionContext,
    /// Listing, fetching and settings against the paired host.
    pub catalog: CatalogClient,
    /// The single cancellable-operation slot.
    pub coordinator: CancellationCoordinator,
    pub metrics: TransferMetrics,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> ClientResult<Self> {
        let host = HostClient::new(&config.http)?;
        let session = SessionContext::new(SessionStore::new(db.clone()));

        Ok(Self {
            db,
            config: Arc::new(config),
            session,
            catalog: CatalogClient::new(host),
            coordinator: CancellationCoordinator::new(),
            metrics: TransferMetrics::new(),
        })
    }

    pub fn downloader(&self) -> Downloader {
        Downloader::new(self.catalog.clone(), self.coordinator.clone(), self.metrics.clone())
    }

    /// Closes the pool so the WAL is checkpointed before the process exits.
    pub async fn shutdown(&self) {
        self.db.close().await;
        tracing::debug!("database pool closed");
    }
}
