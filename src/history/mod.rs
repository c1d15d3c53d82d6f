// src/history/mod.rs

mod store;

pub use store::{MetadataStore, RunMetadata, METADATA_FILE_NAME};
