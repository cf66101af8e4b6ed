//! Data ingestion: download (or reuse) the archive, then extract it.

use std::time::Duration;
use tracing::info;

use winelab_core::config::DataIngestionConfig;
use winelab_core::data::{ensure_archive, extract_archive, Fetcher, HttpFetcher};

use crate::stage::{Stage, StageDetail, StageError, StageName, StageOutcome};

pub struct DataIngestion {
    config: DataIngestionConfig,
    fetcher: Box<dyn Fetcher>,
}

impl DataIngestion {
    pub fn new(config: DataIngestionConfig, fetcher: Box<dyn Fetcher>) -> Self {
        Self { config, fetcher }
    }

    /// Ingestion over HTTP with the configured timeout.
    pub fn over_http(config: DataIngestionConfig) -> Result<Self, StageError> {
        let fetcher = HttpFetcher::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(config, Box::new(fetcher)))
    }
}

impl Stage for DataIngestion {
    fn name(&self) -> StageName {
        StageName::Ingestion
    }

    fn run(&mut self) -> Result<StageOutcome, StageError> {
        let archive = &self.config.local_data_file;
        ensure_archive(self.fetcher.as_ref(), &self.config.source_url, archive)?;
        let files = extract_archive(archive, &self.config.unzip_dir)?;
        info!(
            archive = %archive.display(),
            dest = %self.config.unzip_dir.display(),
            "ingestion complete"
        );
        Ok(StageOutcome::new(
            StageName::Ingestion,
            StageDetail::Ingested {
                archive: archive.clone(),
                files,
            },
        ))
    }
}
