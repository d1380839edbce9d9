//! AWS Signature Version 4 request signing.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::{Digest, Sha256};
use url::Url;

use crate::aws::aws_config::AwsConfig;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// The parts of an outgoing request that go into the signature.
#[derive(Debug)]
pub struct SigningInput<'a> {
    pub method: &'a str,
    pub host: &'a str,
    /// Already URI-encoded path, e.g. `/stock_data/AAPL/x.json`.
    pub path: &'a str,
    /// Canonical (sorted, encoded) query string; empty when there is none.
    pub query: &'a str,
    /// Extra headers the caller sends and wants covered by the signature.
    pub headers: &'a [(&'a str, &'a str)],
    pub payload: &'a [u8],
}

#[derive(Clone, Debug)]
pub struct AwsSigner {
    config: AwsConfig,
    service: &'static str,
}

impl AwsSigner {
    pub fn new(config: AwsConfig, service: &'static str) -> Self {
        Self { config, service }
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    /// Headers to add to the request: `x-amz-date`, `authorization` and, where the service
    /// needs them, `x-amz-content-sha256` and `x-amz-security-token`.
    pub fn signed_headers(&self, input: &SigningInput<'_>, now: DateTime<Utc>) -> Result<HeaderMap> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let payload_hash = sha256_hex(input.payload);

        let mut added: Vec<(&'static str, String)> = vec![("x-amz-date", amz_date.clone())];
        /* S3 refuses requests without the payload hash header */
        if self.service == "s3" {
            added.push(("x-amz-content-sha256", payload_hash.clone()));
        }
        if let Some(token) = &self.config.session_token {
            added.push(("x-amz-security-token", token.clone()));
        }

        let mut canonical: Vec<(String, String)> = vec![("host".to_string(), input.host.to_string())];
        canonical.extend(added.iter().map(|(name, value)| (name.to_string(), value.clone())));
        canonical.extend(
            input
                .headers
                .iter()
                .map(|(name, value)| (name.to_lowercase(), value.trim().to_string())),
        );
        canonical.sort_by(|a, b| a.0.cmp(&b.0));

        let canonical_headers: String = canonical
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_header_names = canonical
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            input.method,
            input.path,
            input.query,
            canonical_headers,
            signed_header_names,
            payload_hash
        );

        let scope = format!(
            "{date}/{}/{}/aws4_request",
            self.config.region, self.service
        );
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            sha256_hex(canonical_request.as_bytes())
        );

        let signing_key = self.signing_key(&date)?;
        let signature = hex(&hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_header_names}, Signature={signature}",
            self.config.access_key_id
        );

        let mut headers = HeaderMap::new();
        for (name, value) in added {
            headers.insert(
                name,
                HeaderValue::from_str(&value)
                    .map_err(|_| anyhow!("invalid {name} header value"))?,
            );
        }
        headers.insert(
            "authorization",
            HeaderValue::from_str(&authorization)
                .map_err(|_| anyhow!("invalid authorization header value"))?,
        );

        Ok(headers)
    }

    fn signing_key(&self, date: &str) -> Result<Vec<u8>> {
        let secret = format!("AWS4{}", self.config.secret_access_key);

        let date_key = hmac_sha256(secret.as_bytes(), date.as_bytes())?;
        let region_key = hmac_sha256(&date_key, self.config.region.as_bytes())?;
        let service_key = hmac_sha256(&region_key, self.service.as_bytes())?;

        hmac_sha256(&service_key, b"aws4_request")
    }
}

/// `Host` header value for `url`, including a non-default port.
pub fn host_header(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("url has no host: {url}"))?;

    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Percent-encodes everything outside the unreserved set, keeping `/` when `keep_slash`.
pub fn uri_encode(input: &str, keep_slash: bool) -> String {
    let mut encoded = String::with_capacity(input.len());

    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            b'/' if keep_slash => encoded.push('/'),
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }

    encoded
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex(&Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| anyhow!("invalid HMAC key"))?;
    mac.update(data);

    Ok(mac.finalize().into_bytes().to_vec())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
