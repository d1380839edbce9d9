use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::aws::aws_config::AwsConfig;
use crate::aws::aws_signer::{AwsSigner, SigningInput, host_header, uri_encode};
use crate::storage::BlobStore;

#[derive(Clone, Debug)]
pub struct S3BlobStore {
    http: reqwest::Client,
    signer: AwsSigner,
    bucket: String,
    /// Path-style endpoint override; virtual-hosted AWS addressing when `None`.
    endpoint: Option<Url>,
}

impl S3BlobStore {
    pub fn new(config: AwsConfig, bucket: impl Into<String>, endpoint: Option<&str>) -> Result<Self> {
        let endpoint = endpoint
            .map(|raw| Url::parse(raw).with_context(|| format!("invalid s3 endpoint {raw}")))
            .transpose()?;

        Ok(Self {
            http: reqwest::Client::new(),
            signer: AwsSigner::new(config, "s3"),
            bucket: bucket.into(),
            endpoint,
        })
    }

    /// Object URL and the encoded path that goes into the signature.
    pub fn object_url(&self, key: &str) -> Result<(Url, String)> {
        let encoded_key = uri_encode(key, true);

        let (origin, path) = match &self.endpoint {
            Some(endpoint) => (
                endpoint.origin().ascii_serialization(),
                format!("/{}/{encoded_key}", uri_encode(&self.bucket, false)),
            ),
            None => (
                format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.signer.region()),
                format!("/{encoded_key}"),
            ),
        };

        let url = Url::parse(&format!("{origin}{path}"))
            .with_context(|| format!("invalid object url for key {key}"))?;

        Ok((url, path))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let (url, path) = self.object_url(key)?;
        let host = host_header(&url)?;

        let input = SigningInput {
            method: "PUT",
            host: &host,
            path: &path,
            query: "",
            headers: &[("content-type", content_type)],
            payload: &body,
        };
        let headers = self.signer.signed_headers(&input, Utc::now())?;

        let resp = self
            .http
            .put(url)
            .headers(headers)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .context("s3 PUT failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("s3 http error {status} for {key}: {text}");
        }

        Ok(())
    }

    fn uri(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AwsConfig {
        AwsConfig {
            access_key_id: "AKID".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: None,
            region: "ap-southeast-2".to_string(),
        }
    }

    #[test]
    fn virtual_hosted_object_url() {
        let store = S3BlobStore::new(config(), "stock-data-bucket", None).unwrap();

        let (url, path) = store.object_url("stock_data/AAPL/a_b.json").unwrap();

        assert_eq!(
            url.as_str(),
            "https://stock-data-bucket.s3.ap-southeast-2.amazonaws.com/stock_data/AAPL/a_b.json"
        );
        assert_eq!(path, "/stock_data/AAPL/a_b.json");
    }

    #[test]
    fn path_style_object_url_for_custom_endpoint() {
        let store =
            S3BlobStore::new(config(), "stock-data-bucket", Some("http://localhost:9000")).unwrap();

        let (url, path) = store.object_url("manifest.json").unwrap();

        assert_eq!(url.as_str(), "http://localhost:9000/stock-data-bucket/manifest.json");
        assert_eq!(path, "/stock-data-bucket/manifest.json");
    }

    #[test]
    fn encodes_unsafe_key_characters() {
        let store = S3BlobStore::new(config(), "b", None).unwrap();

        let (url, path) = store.object_url("stock_data/^GSPC/x y.json").unwrap();

        assert_eq!(path, "/stock_data/%5EGSPC/x%20y.json");
        assert_eq!(url.path(), path);
    }

    #[test]
    fn uri_is_bucket_scheme() {
        let store = S3BlobStore::new(config(), "stock-data-bucket", None).unwrap();

        assert_eq!(store.uri(), "s3://stock-data-bucket");
    }
}
