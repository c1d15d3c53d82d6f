use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{EtlError, Result};
use crate::process::utils::parse_timestamp;

pub const METADATA_FILE_NAME: &str = "metadata_last_update.json";

/// The single record of the previous successful run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RunMetadata {
    pub last_run: DateTime<Utc>,
}

/// On-disk shape. `last_run` is kept as text so older naive timestamps
/// can still be read back.
#[derive(Deserialize)]
struct StoredRecord {
    last_run: String,
}

/// File-backed watermark. Only the orchestrator touches it, before and after
/// the concurrent phase, so there is no locking.
#[derive(Clone, Debug)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last persisted watermark, or `DateTime::<Utc>::MIN_UTC` when no record
    /// exists yet. A record that exists but cannot be read is fatal.
    pub fn load(&self) -> Result<DateTime<Utc>> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(
                    path = %self.path.display(),
                    "metadata file does not exist; assuming first run"
                );
                return Ok(DateTime::<Utc>::MIN_UTC);
            }
            Err(e) => return Err(self.corrupt(e)),
        };

        let record: StoredRecord = serde_json::from_slice(&bytes).map_err(|e| self.corrupt(e))?;
        let last_run = parse_timestamp(&record.last_run).ok_or_else(|| {
            self.corrupt(format!("unrecognised timestamp `{}`", record.last_run))
        })?;
        debug!(%last_run, "loaded watermark");
        Ok(last_run)
    }

    /// Replace the stored watermark with `last_run`. The new record is written
    /// beside the old one and renamed over it.
    pub fn save(&self, last_run: DateTime<Utc>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, &RunMetadata { last_run }).map_err(io::Error::from)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        info!(%last_run, path = %self.path.display(), "saved watermark");
        Ok(())
    }

    fn corrupt(&self, reason: impl ToString) -> EtlError {
        EtlError::MetadataCorrupt {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_means_process_everything() {
        let tmp = tempdir().unwrap();
        let store = MetadataStore::new(tmp.path().join(METADATA_FILE_NAME));
        assert_eq!(store.load().unwrap(), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempdir().unwrap();
        let store = MetadataStore::new(tmp.path().join(METADATA_FILE_NAME));
        let ts = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        store.save(ts).unwrap();
        assert_eq!(store.load().unwrap(), ts);

        let text = fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["last_run"], "2025-03-04T05:06:07Z");
        assert_eq!(json.as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_save_overwrites() {
        let tmp = tempdir().unwrap();
        let store = MetadataStore::new(tmp.path().join(METADATA_FILE_NAME));
        let first = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        store.save(first).unwrap();
        store.save(second).unwrap();
        assert_eq!(store.load().unwrap(), second);

        let leftovers = fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_reads_naive_iso_timestamp() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join(METADATA_FILE_NAME);
        fs::write(&path, r#"{"last_run": "2024-11-02T08:30:00.250000"}"#).unwrap();
        let store = MetadataStore::new(&path);
        assert_eq!(
            store.load().unwrap(),
            Utc.with_ymd_and_hms(2024, 11, 2, 8, 30, 0).unwrap()
                + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn test_corrupt_record_is_fatal() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join(METADATA_FILE_NAME);
        let store = MetadataStore::new(&path);

        for body in [
            "not json at all",
            r#"{"something_else": 1}"#,
            r#"{"last_run": "whenever"}"#,
        ] {
            fs::write(&path, body).unwrap();
            assert!(
                matches!(store.load(), Err(EtlError::MetadataCorrupt { .. })),
                "body {body:?}"
            );
        }
    }
}
