// src/config.rs

use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

use url::Url;

use crate::error::EtlError;

/// CMS provider-data metastore listing every published dataset.
pub const DEFAULT_CATALOG_URL: &str =
    "https://data.cms.gov/provider-data/api/1/metastore/schemas/dataset/items";
pub const DEFAULT_OUTPUT_DIR: &str = "cms_provider_hospitals_csv_output";
pub const DEFAULT_THEME: &str = "Hospitals";
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Which instant becomes the new watermark once a run completes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WatermarkPolicy {
    /// Wall clock captured before the catalog is fetched.
    #[default]
    RunStart,
    /// Wall clock captured after every dataset attempt has finished.
    RunEnd,
    /// Greatest `modified` among datasets written this run, never moving backwards.
    MaxModified,
}

impl FromStr for WatermarkPolicy {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "run-start" | "start" => Ok(Self::RunStart),
            "run-end" | "end" => Ok(Self::RunEnd),
            "max-modified" | "modified" => Ok(Self::MaxModified),
            other => Err(EtlError::Config(format!(
                "unknown watermark policy `{other}` (expected run-start, run-end or max-modified)"
            ))),
        }
    }
}

impl fmt::Display for WatermarkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RunStart => "run-start",
            Self::RunEnd => "run-end",
            Self::MaxModified => "max-modified",
        })
    }
}

/// Everything a run needs, resolved once and handed to the orchestrator.
#[derive(Clone, Debug)]
pub struct Config {
    pub output_dir: PathBuf,
    pub catalog_url: Url,
    pub theme: String,
    pub max_workers: usize,
    pub download_timeout: Option<Duration>,
    pub watermark: WatermarkPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            catalog_url: Url::parse(DEFAULT_CATALOG_URL).expect("default catalog URL is valid"),
            theme: DEFAULT_THEME.to_string(),
            max_workers: DEFAULT_MAX_WORKERS,
            download_timeout: None,
            watermark: WatermarkPolicy::default(),
        }
    }
}

impl Config {
    /// Build from process environment, falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, EtlError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EtlError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(dir) = get("OUTPUT_DIR") {
            cfg.output_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get("CATALOG_URL") {
            cfg.catalog_url = Url::parse(raw.trim())
                .map_err(|e| EtlError::Config(format!("CATALOG_URL `{raw}`: {e}")))?;
        }
        if let Some(theme) = get("CATALOG_THEME") {
            cfg.theme = theme;
        }
        if let Some(raw) = get("MAX_WORKERS") {
            let n: usize = raw
                .trim()
                .parse()
                .map_err(|e| EtlError::Config(format!("MAX_WORKERS `{raw}`: {e}")))?;
            cfg = cfg.with_max_workers(n)?;
        }
        if let Some(raw) = get("DOWNLOAD_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|e| EtlError::Config(format!("DOWNLOAD_TIMEOUT_SECS `{raw}`: {e}")))?;
            cfg.download_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(raw) = get("WATERMARK_POLICY") {
            cfg.watermark = raw.parse()?;
        }

        Ok(cfg)
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_catalog_url(mut self, url: Url) -> Self {
        self.catalog_url = url;
        self
    }

    pub fn with_max_workers(mut self, n: usize) -> Result<Self, EtlError> {
        if n == 0 {
            return Err(EtlError::Config("MAX_WORKERS must be at least 1".into()));
        }
        self.max_workers = n;
        Ok(self)
    }

    pub fn with_download_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_watermark(mut self, policy: WatermarkPolicy) -> Self {
        self.watermark = policy;
        self
    }

    /// Location of the persisted run metadata.
    pub fn metadata_path(&self) -> PathBuf {
        self.output_dir.join(crate::history::METADATA_FILE_NAME)
    }
}
