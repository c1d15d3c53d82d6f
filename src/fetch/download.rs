use anyhow::{Context, Result};
use reqwest::Client;
use url::Url;

/// GET `url_str` and return the response body. Non-success statuses are errors.
pub async fn download_csv(client: &Client, url_str: &str) -> Result<Vec<u8>> {
    let url = Url::parse(url_str.trim()).with_context(|| format!("invalid download URL `{url_str}`"))?;

    let resp = client
        .get(url.as_str())
        .send()
        .await
        .with_context(|| format!("GET {url} failed"))?
        .error_for_status()
        .with_context(|| format!("non-success status from {url}"))?;
    let bytes = resp
        .bytes()
        .await
        .with_context(|| format!("reading body from {url}"))?;

    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[tokio::test]
    async fn test_download_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a,b\n1,2\n"))
            .mount(&server)
            .await;

        let body = download_csv(&Client::new(), &format!("{}/data.csv", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_download_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = Client::new();
        assert!(download_csv(&client, &format!("{}/missing.csv", server.uri()))
            .await
            .is_err());
        assert!(download_csv(&client, "not-a-url").await.is_err());
    }
}
