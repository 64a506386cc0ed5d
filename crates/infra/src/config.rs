//! Environment-driven store configuration.
//!
//! | variable | default | meaning |
//! |---|---|---|
//! | `USE_PERSISTENT_STORES` | `false` | use Postgres instead of the in-memory store |
//! | `DATABASE_URL` | none | Postgres connection string (required when persistent) |
//! | `DATABASE_MAX_CONNECTIONS` | `5` | pool size |

use std::sync::Arc;

use anyhow::{Context, bail};

use crate::store::{InMemoryStore, PostgresStore, RecordStore};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Which backend the ledger runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

impl StoreConfig {
    /// Read the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup (the environment, a map in tests, ...).
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let use_persistent = match lookup("USE_PERSISTENT_STORES") {
            Some(raw) => raw
                .trim()
                .parse::<bool>()
                .with_context(|| format!("USE_PERSISTENT_STORES must be true or false, got '{raw}'"))?,
            None => false,
        };

        if !use_persistent {
            return Ok(StoreConfig::InMemory);
        }

        let Some(database_url) = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) else {
            bail!("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");
        };

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS must be a positive integer, got '{raw}'"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        if max_connections == 0 {
            bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        Ok(StoreConfig::Postgres {
            database_url,
            max_connections,
        })
    }
}

/// Open the configured store, applying the schema when it is Postgres.
pub async fn connect_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config {
        StoreConfig::InMemory => {
            tracing::info!("using in-memory record store");
            Ok(InMemoryStore::arc())
        }
        StoreConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PostgresStore::connect(database_url, *max_connections)
                .await
                .context("failed to connect to Postgres")?;
            store.migrate().await.context("failed to apply schema")?;
            tracing::info!(max_connections, "using Postgres record store");
            Ok(Arc::new(store))
        }
    }
}
