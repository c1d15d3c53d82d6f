// src/process/dataset.rs

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use tokio::{task, time};
use tracing::{debug, error, info, instrument, warn};

use super::table::ProcessedTable;
use crate::fetch::{download::download_csv, DatasetDescriptor};
use crate::process::utils::parse_timestamp;

/// Why a dataset was passed over without being an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    MissingIdentifier,
    MissingModified,
    InvalidModified,
    InvalidIdentifier,
    NoDistribution,
    NoDownloadUrl,
}

/// Result of one dataset attempt. Only `Written` means a file changed on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Written {
        identifier: String,
        modified: DateTime<Utc>,
        rows: usize,
    },
    Unchanged,
    Skipped(SkipReason),
    Failed(String),
}

impl Outcome {
    /// Identifier of the dataset when it was actually written.
    pub fn written(&self) -> Option<&str> {
        match self {
            Outcome::Written { identifier, .. } => Some(identifier),
            _ => None,
        }
    }
}

/// Downloads, renames headers, and writes a single catalog dataset.
/// Never returns an error: every failure is logged and folded into [`Outcome`].
#[derive(Clone, Debug)]
pub struct DatasetProcessor {
    client: Client,
    output_dir: PathBuf,
    timeout: Option<Duration>,
}

impl DatasetProcessor {
    pub fn new(client: Client, output_dir: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
            timeout,
        }
    }

    /// `<output_dir>/<identifier>.csv`
    pub fn output_path(&self, identifier: &str) -> PathBuf {
        self.output_dir.join(format!("{identifier}.csv"))
    }

    #[instrument(
        level = "info",
        skip_all,
        fields(
            dataset = descriptor.identifier.as_deref().unwrap_or("<none>"),
            title = descriptor.title.as_deref().unwrap_or_default()
        )
    )]
    pub async fn process(&self, descriptor: &DatasetDescriptor, last_run: DateTime<Utc>) -> Outcome {
        let Some(identifier) = descriptor.identifier.as_deref().filter(|s| !s.trim().is_empty())
        else {
            debug!("catalog record has no identifier");
            return Outcome::Skipped(SkipReason::MissingIdentifier);
        };
        let Some(raw_modified) = descriptor.modified.as_deref().filter(|s| !s.trim().is_empty())
        else {
            debug!("catalog record has no modified timestamp");
            return Outcome::Skipped(SkipReason::MissingModified);
        };
        let Some(modified) = parse_timestamp(raw_modified) else {
            warn!(modified = raw_modified, "unparsable modified timestamp");
            return Outcome::Skipped(SkipReason::InvalidModified);
        };

        if modified <= last_run {
            info!(%modified, "Skipping unchanged dataset");
            return Outcome::Unchanged;
        }

        if !is_plain_file_stem(identifier) {
            warn!("identifier cannot be used as a file name");
            return Outcome::Skipped(SkipReason::InvalidIdentifier);
        }

        let Some(first) = descriptor.distributions().first() else {
            warn!("No download URL for dataset");
            return Outcome::Skipped(SkipReason::NoDistribution);
        };
        let Some(url) = first.download_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            warn!("No valid download URL for dataset");
            return Outcome::Skipped(SkipReason::NoDownloadUrl);
        };

        let path = self.output_path(identifier);
        match self.fetch_and_write(url, &path).await {
            Ok(rows) => {
                info!(rows, path = %path.display(), "Saved dataset");
                Outcome::Written {
                    identifier: identifier.to_string(),
                    modified,
                    rows,
                }
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to process dataset");
                Outcome::Failed(identifier.to_string())
            }
        }
    }

    async fn fetch_and_write(&self, url: &str, path: &Path) -> Result<usize> {
        info!(%url, "Downloading dataset");
        // the timeout covers the download only; a started write always runs to completion
        let body = match self.timeout {
            Some(limit) => time::timeout(limit, download_csv(&self.client, url))
                .await
                .map_err(|_| anyhow!("download timed out after {limit:?}"))??,
            None => download_csv(&self.client, url).await?,
        };

        // parsing and writing are blocking; keep them off the async workers
        let path = path.to_path_buf();
        task::spawn_blocking(move || {
            let mut table = ProcessedTable::from_csv_bytes(&body)?;
            table.normalize_headers();
            table.write_to(&path)?;
            Ok::<_, anyhow::Error>(table.rows.len())
        })
        .await
        .context("CSV task panicked")?
    }
}

fn is_plain_file_stem(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier != "."
        && identifier != ".."
        && !identifier.contains(['/', '\\', '\0'])
}
