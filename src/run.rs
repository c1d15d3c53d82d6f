// src/run.rs

use std::{fs, sync::Arc};

use chrono::{DateTime, Utc};
use reqwest::Client;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{error, info, instrument};

use crate::{
    config::{Config, WatermarkPolicy},
    error::{EtlError, Result},
    fetch::{CatalogClient, DatasetDescriptor},
    history::MetadataStore,
    process::{DatasetProcessor, Outcome},
};

/// Tally of one run. `processed` is in completion order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub candidates: usize,
    pub processed: Vec<String>,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub watermark: DateTime<Utc>,
}

/// Drives a full incremental pass: watermark in, catalog, bounded concurrent
/// processing, watermark out.
pub struct Orchestrator {
    config: Config,
    client: Client,
    store: MetadataStore,
}

impl Orchestrator {
    pub fn new(config: Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EtlError::Config(format!("building HTTP client: {e}")))?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: Config, client: Client) -> Self {
        let store = MetadataStore::new(config.metadata_path());
        Self {
            config,
            client,
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one pass. Only metadata and catalog problems are returned as errors;
    /// both happen before any dataset work starts.
    #[instrument(level = "info", skip(self), fields(output_dir = %self.config.output_dir.display()))]
    pub async fn run(&self) -> Result<RunSummary> {
        info!("Hospital ETL job started");
        let started = Utc::now();
        fs::create_dir_all(&self.config.output_dir)?;

        let last_run = self.store.load()?;
        let catalog = CatalogClient::new(
            self.client.clone(),
            self.config.catalog_url.clone(),
            self.config.theme.clone(),
        );
        let candidates = catalog.fetch_candidates().await?;
        let total = candidates.len();

        let outcomes = self.process_all(candidates, last_run).await;

        let mut summary = RunSummary {
            candidates: total,
            processed: Vec::new(),
            unchanged: 0,
            skipped: 0,
            failed: 0,
            watermark: last_run,
        };
        let mut max_modified: Option<DateTime<Utc>> = None;
        for outcome in outcomes {
            match outcome {
                Outcome::Written {
                    identifier,
                    modified,
                    ..
                } => {
                    max_modified = max_modified.max(Some(modified));
                    summary.processed.push(identifier);
                }
                Outcome::Unchanged => summary.unchanged += 1,
                Outcome::Skipped(_) => summary.skipped += 1,
                Outcome::Failed(_) => summary.failed += 1,
            }
        }

        summary.watermark = match self.config.watermark {
            WatermarkPolicy::RunStart => started,
            WatermarkPolicy::RunEnd => Utc::now(),
            WatermarkPolicy::MaxModified => max_modified.map_or(last_run, |m| m.max(last_run)),
        };
        self.store.save(summary.watermark)?;

        let n = summary.processed.len();
        info!(
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            failed = summary.failed,
            "Hospital ETL job completed. {} {} processed",
            n,
            if n == 1 { "dataset" } else { "datasets" }
        );
        Ok(summary)
    }

    /// Process every candidate with at most `max_workers` in flight and wait
    /// for all of them. Outcomes arrive in completion order.
    async fn process_all(
        &self,
        candidates: Vec<DatasetDescriptor>,
        last_run: DateTime<Utc>,
    ) -> Vec<Outcome> {
        let processor = Arc::new(DatasetProcessor::new(
            self.client.clone(),
            &self.config.output_dir,
            self.config.download_timeout,
        ));
        let sem = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let mut tasks = JoinSet::new();

        for descriptor in candidates {
            let processor = Arc::clone(&processor);
            let sem = Arc::clone(&sem);
            tasks.spawn(async move {
                let _permit = match sem.acquire().await {
                    Ok(p) => p,
                    Err(e) => {
                        error!(error = %e, "worker pool closed");
                        return Outcome::Failed(descriptor.identifier.unwrap_or_default());
                    }
                };
                processor.process(&descriptor, last_run).await
            });
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(error = %e, "dataset task panicked");
                    outcomes.push(Outcome::Failed(String::new()));
                }
            }
        }
        outcomes
    }
}
