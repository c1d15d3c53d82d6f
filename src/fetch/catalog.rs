// src/fetch/catalog.rs

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use url::Url;

use crate::error::{EtlError, Result};
use crate::process::utils::parse_timestamp;

/// One downloadable resource attached to a catalog record.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Distribution {
    #[serde(default, rename = "downloadURL")]
    pub download_url: Option<String>,
}

/// A dataset as listed by the metastore. Every field is optional on the wire;
/// the processor decides what to do when one is missing.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct DatasetDescriptor {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub theme: Option<Vec<String>>,
    #[serde(default)]
    pub distribution: Option<Vec<Distribution>>,
}

impl DatasetDescriptor {
    /// True when any theme label contains `theme` as a substring.
    pub fn has_theme(&self, theme: &str) -> bool {
        self.theme
            .as_ref()
            .is_some_and(|labels| labels.iter().any(|label| label.contains(theme)))
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.modified.as_deref().and_then(parse_timestamp)
    }

    pub fn distributions(&self) -> &[Distribution] {
        self.distribution.as_deref().unwrap_or_default()
    }
}

/// Keep only records tagged with `theme`, in catalog order.
pub fn filter_by_theme(records: Vec<DatasetDescriptor>, theme: &str) -> Vec<DatasetDescriptor> {
    records.into_iter().filter(|d| d.has_theme(theme)).collect()
}

pub struct CatalogClient {
    client: Client,
    url: Url,
    theme: String,
}

impl CatalogClient {
    pub fn new(client: Client, url: Url, theme: impl Into<String>) -> Self {
        Self {
            client,
            url,
            theme: theme.into(),
        }
    }

    /// Fetch the full catalog and keep the records matching the configured theme.
    /// Any transport or status failure is fatal; a partial catalog is never returned.
    #[instrument(level = "info", skip(self), fields(url = %self.url, theme = %self.theme))]
    pub async fn fetch_candidates(&self) -> Result<Vec<DatasetDescriptor>> {
        let records = self.fetch_all().await?;
        let total = records.len();
        let candidates = filter_by_theme(records, &self.theme);
        info!(total, matched = candidates.len(), "fetched dataset catalog");
        Ok(candidates)
    }

    async fn fetch_all(&self) -> Result<Vec<DatasetDescriptor>> {
        let unavailable = |e: reqwest::Error| EtlError::CatalogUnavailable(format!("GET {}: {e}", self.url));

        let body = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(unavailable)?
            .text()
            .await
            .map_err(unavailable)?;

        let values: Vec<serde_json::Value> = serde_json::from_str(&body).map_err(|e| {
            EtlError::CatalogUnavailable(format!("catalog at {} is not a JSON array: {e}", self.url))
        })?;

        // Individual records that don't fit the descriptor shape are dropped, not fatal.
        Ok(values
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value(value) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed catalog record");
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn descriptor(value: serde_json::Value) -> DatasetDescriptor {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_theme_filter() {
        let keep = descriptor(json!({"identifier": "a", "theme": ["General Hospitals", "Other"]}));
        let clinics = descriptor(json!({"identifier": "b", "theme": ["Clinics"]}));
        let no_theme = descriptor(json!({"identifier": "c"}));
        let null_theme = descriptor(json!({"identifier": "d", "theme": null}));
        let exact = descriptor(json!({"identifier": "e", "theme": ["Hospitals"]}));

        let kept = filter_by_theme(vec![keep, clinics, no_theme, null_theme, exact], "Hospitals");
        let ids: Vec<_> = kept.iter().filter_map(|d| d.identifier.as_deref()).collect();
        assert_eq!(ids, vec!["a", "e"]);
    }

    #[test]
    fn test_theme_match_is_case_sensitive() {
        let lower = descriptor(json!({"theme": ["hospitals"]}));
        assert!(!lower.has_theme("Hospitals"));
    }

    #[test]
    fn test_descriptor_fields() {
        let d = descriptor(json!({
            "identifier": "xubh-q36u",
            "title": "Hospital General Information",
            "modified": "2025-02-13",
            "theme": ["Hospitals"],
            "distribution": [{"downloadURL": "https://example.org/a.csv", "mediaType": "text/csv"}],
            "keyword": ["ignored"]
        }));
        assert_eq!(d.identifier.as_deref(), Some("xubh-q36u"));
        assert_eq!(d.distributions().len(), 1);
        assert_eq!(
            d.distributions()[0].download_url.as_deref(),
            Some("https://example.org/a.csv")
        );
        assert_eq!(
            d.modified_at().unwrap().to_rfc3339(),
            "2025-02-13T00:00:00+00:00"
        );

        let bare = descriptor(json!({}));
        assert!(bare.distributions().is_empty());
        assert!(bare.modified_at().is_none());
    }

    #[tokio::test]
    async fn test_fetch_candidates_filters_and_keeps_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"identifier": "z", "theme": ["Hospitals"], "modified": "2025-01-01"},
                {"identifier": "y", "theme": ["Physicians"]},
                {"identifier": "x", "theme": ["Hospitals", "Quality"]},
                {"identifier": 42, "theme": ["Hospitals"]}
            ])))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/items", server.uri())).unwrap();
        let catalog = CatalogClient::new(Client::new(), url, "Hospitals");
        let found = catalog.fetch_candidates().await.unwrap();
        let ids: Vec<_> = found.iter().filter_map(|d| d.identifier.as_deref()).collect();
        assert_eq!(ids, vec!["z", "x"]);
    }

    #[tokio::test]
    async fn test_error_status_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let catalog = CatalogClient::new(Client::new(), url, "Hospitals");
        assert!(matches!(
            catalog.fetch_candidates().await,
            Err(EtlError::CatalogUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_non_array_body_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let catalog = CatalogClient::new(Client::new(), url, "Hospitals");
        assert!(matches!(
            catalog.fetch_candidates().await,
            Err(EtlError::CatalogUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_is_fatal() {
        // Bind then drop a server so the port is very likely closed.
        let uri = {
            let server = MockServer::start().await;
            server.uri()
        };
        let catalog = CatalogClient::new(Client::new(), Url::parse(&uri).unwrap(), "Hospitals");
        assert!(matches!(
            catalog.fetch_candidates().await,
            Err(EtlError::CatalogUnavailable(_))
        ));
    }
}
