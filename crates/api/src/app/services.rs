//! Store selection and engine wiring.
//!
//! `DATABASE_DSN` set: Postgres (schema created on startup).
//! Unset: in-memory store, for local development and tests.

use stocktake_core::MaterialCode;
use stocktake_infra::config::AppConfig;
use stocktake_infra::engine::{CheckError, CheckReceipt, EngineConfig, InventoryCheckEngine};
use stocktake_infra::store::{
    CheckRecordPage, InMemoryCheckStore, Pagination, PostgresCheckStore, StoreError,
};
use stocktake_inventory::InventoryCheckInput;

pub enum AppServices {
    InMemory {
        engine: InventoryCheckEngine<InMemoryCheckStore>,
    },
    Postgres {
        engine: InventoryCheckEngine<PostgresCheckStore>,
    },
}

impl AppServices {
    pub fn in_memory(config: EngineConfig) -> Self {
        AppServices::InMemory {
            engine: InventoryCheckEngine::with_config(InMemoryCheckStore::new(), config),
        }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self, StoreError> {
        let Some(dsn) = config.database_dsn.as_deref() else {
            tracing::warn!("DATABASE_DSN not set; falling back to in-memory store");
            return Ok(Self::in_memory(config.engine_config()));
        };

        let store = PostgresCheckStore::connect(dsn, &config.pool).await?;
        tracing::info!("database connection established");

        store.ensure_schema().await?;
        tracing::info!("database schema ready");

        Ok(AppServices::Postgres {
            engine: InventoryCheckEngine::with_config(store, config.engine_config()),
        })
    }

    pub fn backend(&self) -> &'static str {
        match self {
            AppServices::InMemory { .. } => "in_memory",
            AppServices::Postgres { .. } => "postgres",
        }
    }

    pub async fn process_check(&self, input: &InventoryCheckInput) -> Result<CheckReceipt, CheckError> {
        match self {
            AppServices::InMemory { engine } => engine.process_check(input).await,
            AppServices::Postgres { engine } => engine.process_check(input).await,
        }
    }

    pub async fn process_batch(
        &self,
        inputs: &[InventoryCheckInput],
    ) -> Vec<Result<CheckReceipt, CheckError>> {
        match self {
            AppServices::InMemory { engine } => engine.process_batch(inputs).await,
            AppServices::Postgres { engine } => engine.process_batch(inputs).await,
        }
    }

    pub async fn records_by_material(
        &self,
        material_code: &MaterialCode,
        pagination: Pagination,
    ) -> Result<CheckRecordPage, StoreError> {
        match self {
            AppServices::InMemory { engine } => engine.records_by_material(material_code, pagination).await,
            AppServices::Postgres { engine } => engine.records_by_material(material_code, pagination).await,
        }
    }

    pub async fn unprocessed_records(&self, pagination: Pagination) -> Result<CheckRecordPage, StoreError> {
        match self {
            AppServices::InMemory { engine } => engine.unprocessed_records(pagination).await,
            AppServices::Postgres { engine } => engine.unprocessed_records(pagination).await,
        }
    }

    /// Stop accepting new transactions.
    pub async fn close(&self) {
        match self {
            AppServices::InMemory { engine } => engine.store().close(),
            AppServices::Postgres { engine } => {
                engine.store().close().await;
                tracing::info!("database connections closed");
            }
        }
    }
}
