// src/fetch/mod.rs

pub mod catalog;
pub mod download;

pub use catalog::{CatalogClient, DatasetDescriptor, Distribution};
