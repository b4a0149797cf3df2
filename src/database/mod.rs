pub mod manager;
pub mod memory;
pub mod postgres;
pub mod seed;

use std::sync::Arc;
use tracing::{error, info, warn};

pub use manager::{DatabaseError, DatabaseManager, SchemaInit};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::config::AppConfig;
use crate::services::Store;

/// Select and prepare the persistence backend.
///
/// With a `DATABASE_URL` the schema is initialized on a best-effort basis: a
/// failure is logged and the service starts degraded. Without one, development
/// falls back to a seeded in-memory store and other environments refuse to start.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn Store>, DatabaseError> {
    if config.database.url.is_none() {
        if config.is_development() {
            warn!("DATABASE_URL not set, using in-memory store (data is lost on restart)");
            return Ok(Arc::new(MemoryStore::seeded(&config.directory)));
        }
        return Err(DatabaseError::ConfigMissing("DATABASE_URL"));
    }

    let manager = DatabaseManager::connect_lazy(&config.database)?;
    match manager.initialize_schema(&config.directory).await {
        Ok(SchemaInit::Created) => info!("Database initialized"),
        Ok(SchemaInit::AlreadyPresent) => info!("Database ready"),
        Err(e) => error!("Database initialization failed, continuing degraded: {}", e),
    }

    Ok(Arc::new(PgStore::new(manager.pool().clone())))
}
