//! Application state.

use std::sync::Arc;

use tlearn_ai::{Gateway, SummarizationPipeline, TranscriptSource};
use tlearn_db::Db;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub db: Db,
    pub gateway: Arc<Gateway>,
    pub transcripts: Arc<TranscriptSource>,
}

impl AppState {
    /// Create new application state, opening the database.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Db::open(&config.database_path).await?;
        Ok(Self::with_db(config, db))
    }

    /// Build state over an existing database handle. Used by tests.
    pub fn with_db(config: ApiConfig, db: Db) -> Self {
        Self {
            config,
            db,
            gateway: Arc::new(Gateway::new()),
            transcripts: Arc::new(TranscriptSource::new()),
        }
    }

    /// Assemble a pipeline instance wired to this state's collaborators.
    pub fn pipeline(&self) -> SummarizationPipeline {
        SummarizationPipeline::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.transcripts),
            self.db.clone(),
            self.config.export_dir.clone(),
        )
    }
}
