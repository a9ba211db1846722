//! Store selection and workflow wiring.

use std::sync::Arc;

use anyhow::Context;

use stockflow_infra::config::{Backend, Settings};
use stockflow_infra::{InMemoryStore, PostgresStore, Store, Workflows};

#[derive(Clone)]
pub struct AppServices {
    pub workflows: Workflows,
}

impl AppServices {
    pub fn new(workflows: Workflows) -> Self {
        Self { workflows }
    }
}

/// Open the configured store and build the workflows over it.
pub async fn build_services(settings: &Settings) -> anyhow::Result<AppServices> {
    let store: Arc<dyn Store> = match settings.store.backend {
        Backend::Memory => {
            tracing::warn!("using the in-memory store; data is lost on restart");
            Arc::new(InMemoryStore::new(settings.store.lock_timeout()))
        }
        Backend::Postgres => {
            let url = settings
                .store
                .database_url
                .as_deref()
                .context("store.database_url is required for the postgres backend")?;
            let store = PostgresStore::connect(
                url,
                settings.store.max_connections,
                settings.store.lock_timeout(),
            )
            .await
            .context("failed to connect to postgres")?;
            store
                .apply_schema()
                .await
                .context("failed to apply schema")?;
            Arc::new(store)
        }
    };

    let workflows = Workflows::from_settings(store, settings)?;
    Ok(AppServices::new(workflows))
}
