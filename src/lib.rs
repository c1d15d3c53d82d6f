//! Incremental downloader for hospital-themed datasets in the CMS
//! provider-data catalog.
//!
//! A run reads the stored watermark, lists catalog datasets tagged with the
//! configured theme, downloads those modified since the watermark (a bounded
//! number at a time), normalizes their column names and writes one CSV per
//! dataset. The watermark is advanced once every attempt has finished.

pub mod config;
pub mod error;
pub mod fetch;
pub mod history;
pub mod process;
pub mod run;

pub use config::{Config, WatermarkPolicy};
pub use error::EtlError;
pub use run::{Orchestrator, RunSummary};
