//! S3-compatible object storage provider.
//!
//! Talks plain S3 REST (PUT/GET/DELETE/HEAD object, list-objects-v2). The
//! Authorization header is SigV4-*shaped* but deliberately non-conformant:
//! the signature is a keyed Blake2s over a reduced string-to-sign, matching
//! the simplified signing the original implementation shipped with. It will
//! not authenticate against AWS proper; self-hosted gateways that only check
//! header shape accept it.

use async_trait::async_trait;
use blake2::{Blake2s256, Digest};
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::debug;
use url::Url;

use wasmpress_common::{Error, ObjectKey, Result};

use crate::provider::{
    content_hash, guess_content_type, to_hex, Capabilities, ConnectionState, ObjectMeta,
    ProviderKind, SecretString, StorageProvider, UploadReceipt,
};

/// Characters percent-encoded in object keys ('/' stays literal).
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Connection configuration for the S3 provider.
#[derive(Debug, Deserialize)]
struct S3Config {
    /// Endpoint base URL, e.g. `https://s3.example.com`.
    endpoint: String,
    bucket: String,
    access_key: String,
    secret_key: SecretString,
    #[serde(default = "default_region")]
    region: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// S3-compatible storage provider.
pub struct S3Provider {
    state: RwLock<ConnectionState>,
    config: RwLock<Option<S3Config>>,
    http: Client,
}

impl S3Provider {
    /// Create a new disconnected S3 provider.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            config: RwLock::new(None),
            http: Client::new(),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().expect("state lock poisoned") = state;
    }

    fn with_config<T>(&self, f: impl FnOnce(&S3Config) -> T) -> Result<T> {
        match *self.state.read().expect("state lock poisoned") {
            ConnectionState::Connected => {}
            _ => return Err(Error::NotConnected("s3".to_string())),
        }
        let config = self.config.read().expect("config lock poisoned");
        config
            .as_ref()
            .map(f)
            .ok_or_else(|| Error::NotConnected("s3".to_string()))
    }

    fn object_url(config: &S3Config, key: &ObjectKey) -> String {
        format!(
            "{}/{}/{}",
            config.endpoint.trim_end_matches('/'),
            config.bucket,
            utf8_percent_encode(key.as_str(), KEY_ENCODE_SET)
        )
    }

    fn bucket_url(config: &S3Config) -> String {
        format!("{}/{}", config.endpoint.trim_end_matches('/'), config.bucket)
    }

    /// SigV4-style authorization header. Not conformant; see module docs.
    fn auth_header(config: &S3Config, method: &str, path: &str, amz_date: &str) -> String {
        let scope = format!("{}/{}/s3/aws4_request", &amz_date[..8], config.region);
        let string_to_sign = format!("{}\n{}\n{}\n{}", method, path, amz_date, scope);

        let mut hasher = Blake2s256::new();
        hasher.update(config.secret_key.expose().as_bytes());
        hasher.update(string_to_sign.as_bytes());
        let signature = to_hex(&hasher.finalize());

        format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders=host;x-amz-date, Signature={}",
            config.access_key, scope, signature
        )
    }

    fn signed(
        &self,
        config: &S3Config,
        method: reqwest::Method,
        url: &str,
        key_path: &str,
    ) -> reqwest::RequestBuilder {
        let amz_date = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let auth = Self::auth_header(config, method.as_str(), key_path, &amz_date);
        self.http
            .request(method, url)
            .header(header::AUTHORIZATION, auth)
            .header("x-amz-date", amz_date)
    }

    fn meta_from_response(key: &ObjectKey, response: &Response) -> ObjectMeta {
        let headers = response.headers();
        let size = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let etag = headers
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());
        let modified = headers
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        ObjectMeta {
            key: key.clone(),
            size,
            content_type,
            modified,
            etag,
            metadata: BTreeMap::new(),
        }
    }

    async fn error_from(response: Response, context: &str) -> Error {
        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => Error::NotFound(context.to_string()),
            StatusCode::UNAUTHORIZED => Error::Authentication("Invalid credentials".to_string()),
            StatusCode::FORBIDDEN => Error::PermissionDenied(context.to_string()),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Error::Network(format!("{}: {} - {}", context, status, body))
            }
        }
    }
}

impl Default for S3Provider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for S3Provider {
    fn name(&self) -> &str {
        "s3"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloud
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            public_url: true,
            ..Capabilities::FULL
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.read().expect("state lock poisoned")
    }

    async fn connect(&self, config: serde_json::Value) -> Result<()> {
        let config: S3Config = serde_json::from_value(config)
            .map_err(|e| Error::Configuration(format!("s3 provider config: {}", e)))?;
        Url::parse(&config.endpoint)
            .map_err(|e| Error::Configuration(format!("s3 endpoint is not a valid URL: {}", e)))?;
        if config.bucket.is_empty() || config.access_key.is_empty() {
            return Err(Error::Configuration(
                "s3 provider requires 'bucket' and 'access_key'".to_string(),
            ));
        }

        self.set_state(ConnectionState::Connecting);

        // Liveness check: HEAD the bucket.
        let url = Self::bucket_url(&config);
        let response = self
            .signed(&config, reqwest::Method::HEAD, &url, &format!("/{}", config.bucket))
            .send()
            .await
            .map_err(|e| {
                self.set_state(ConnectionState::Error);
                Error::Network(format!("Bucket liveness check failed: {}", e))
            })?;

        if !response.status().is_success() {
            self.set_state(ConnectionState::Error);
            return Err(Self::error_from(response, "Bucket liveness check").await);
        }

        debug!(bucket = %config.bucket, "s3 provider connected");
        *self.config.write().expect("config lock poisoned") = Some(config);
        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.config.write().expect("config lock poisoned") = None;
        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    async fn upload(&self, key: &ObjectKey, data: Vec<u8>) -> Result<UploadReceipt> {
        let (request, url) = self.with_config(|c| {
            let url = Self::object_url(c, key);
            let request = self
                .signed(c, reqwest::Method::PUT, &url, &format!("/{}/{}", c.bucket, key))
                .header(header::CONTENT_TYPE, guess_content_type(key));
            (request, url)
        })?;

        let size = data.len() as u64;
        let hash = content_hash(&data);

        let response = request
            .body(data)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Upload failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, "Upload").await);
        }

        Ok(UploadReceipt {
            key: key.clone(),
            size,
            hash,
            url: Some(url),
            uploaded_at: Utc::now(),
        })
    }

    async fn download(&self, key: &ObjectKey) -> Result<Vec<u8>> {
        let request = self.with_config(|c| {
            let url = Self::object_url(c, key);
            self.signed(c, reqwest::Method::GET, &url, &format!("/{}/{}", c.bucket, key))
        })?;

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("Download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, &format!("Download {}", key)).await);
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Network(format!("Failed to read download body: {}", e)))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool> {
        let request = self.with_config(|c| {
            let url = Self::object_url(c, key);
            self.signed(c, reqwest::Method::DELETE, &url, &format!("/{}/{}", c.bucket, key))
        })?;

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("Delete failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::error_from(response, &format!("Delete {}", key)).await),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let request = self.with_config(|c| {
            let url = format!(
                "{}?list-type=2&prefix={}",
                Self::bucket_url(c),
                utf8_percent_encode(prefix, KEY_ENCODE_SET)
            );
            self.signed(c, reqwest::Method::GET, &url, &format!("/{}", c.bucket))
        })?;

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("List failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, "List").await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read list body: {}", e)))?;

        parse_list_response(&body)
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        let request = self.with_config(|c| {
            let url = Self::object_url(c, key);
            self.signed(c, reqwest::Method::HEAD, &url, &format!("/{}/{}", c.bucket, key))
        })?;

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("Head failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::error_from(response, &format!("Head {}", key)).await),
        }
    }

    async fn metadata(&self, key: &ObjectKey) -> Result<ObjectMeta> {
        let request = self.with_config(|c| {
            let url = Self::object_url(c, key);
            self.signed(c, reqwest::Method::HEAD, &url, &format!("/{}/{}", c.bucket, key))
        })?;

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("Head failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, &format!("Head {}", key)).await);
        }

        Ok(Self::meta_from_response(key, &response))
    }
}

/// Parse a ListObjectsV2 XML response with a minimal scanner.
///
/// Only `<Contents>` blocks and the `Key`/`Size`/`LastModified`/`ETag`
/// fields inside them are read; everything else in the document is ignored.
fn parse_list_response(body: &str) -> Result<Vec<ObjectMeta>> {
    let mut results = Vec::new();

    let mut rest = body;
    while let Some(start) = rest.find("<Contents>") {
        let after = &rest[start + "<Contents>".len()..];
        let end = after.find("</Contents>").ok_or_else(|| {
            Error::Network("Malformed list response: unterminated <Contents>".to_string())
        })?;
        let chunk = &after[..end];
        rest = &after[end + "</Contents>".len()..];

        let Some(key_text) = xml_tag_value(chunk, "Key") else {
            continue;
        };
        let key = ObjectKey::parse(&xml_unescape(key_text))?;
        let size = xml_tag_value(chunk, "Size")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let modified = xml_tag_value(chunk, "LastModified")
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let etag = xml_tag_value(chunk, "ETag").map(|v| v.trim_matches('"').to_string());

        results.push(ObjectMeta {
            key,
            size,
            content_type: None,
            modified,
            etag,
            metadata: BTreeMap::new(),
        });
    }

    Ok(results)
}

fn xml_tag_value<'a>(chunk: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = chunk.find(&open)? + open.len();
    let end = chunk[start..].find(&close)? + start;
    Some(&chunk[start..end])
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operations_fail_fast_when_disconnected() {
        let provider = S3Provider::new();
        let key = ObjectKey::parse("a.txt").unwrap();

        assert!(matches!(
            provider.download(&key).await,
            Err(Error::NotConnected(_))
        ));
        assert!(matches!(provider.list("").await, Err(Error::NotConnected(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_config() {
        let provider = S3Provider::new();

        let result = provider.connect(serde_json::json!({"bucket": "b"})).await;
        assert!(matches!(result, Err(Error::Configuration(_))));

        let result = provider
            .connect(serde_json::json!({
                "endpoint": "not a url",
                "bucket": "b",
                "access_key": "k",
                "secret_key": "s",
            }))
            .await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_auth_header_shape() {
        let config = S3Config {
            endpoint: "https://s3.example.com".to_string(),
            bucket: "bucket".to_string(),
            access_key: "AKID".to_string(),
            secret_key: SecretString::new("secret"),
            region: "eu-west-1".to_string(),
        };

        let auth = S3Provider::auth_header(&config, "PUT", "/bucket/a.txt", "20260101T000000Z");
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKID/20260101/eu-west-1/s3/aws4_request"));
        assert!(auth.contains("Signature="));

        // Same inputs sign identically, different secrets differently.
        let again = S3Provider::auth_header(&config, "PUT", "/bucket/a.txt", "20260101T000000Z");
        assert_eq!(auth, again);

        let other = S3Config {
            secret_key: SecretString::new("other"),
            endpoint: config.endpoint.clone(),
            bucket: config.bucket.clone(),
            access_key: config.access_key.clone(),
            region: config.region.clone(),
        };
        assert_ne!(auth, S3Provider::auth_header(&other, "PUT", "/bucket/a.txt", "20260101T000000Z"));
    }

    #[test]
    fn test_parse_list_response() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult>
  <Name>bucket</Name>
  <Prefix>projects/</Prefix>
  <Contents>
    <Key>projects/a.json</Key>
    <LastModified>2026-01-02T03:04:05.000Z</LastModified>
    <ETag>"abc123"</ETag>
    <Size>42</Size>
  </Contents>
  <Contents>
    <Key>projects/b &amp; c.json</Key>
    <Size>7</Size>
  </Contents>
</ListBucketResult>"#;

        let metas = parse_list_response(body).unwrap();
        assert_eq!(metas.len(), 2);
        assert_eq!(metas[0].key.as_str(), "projects/a.json");
        assert_eq!(metas[0].size, 42);
        assert_eq!(metas[0].etag.as_deref(), Some("abc123"));
        assert_eq!(metas[1].key.as_str(), "projects/b & c.json");
        assert_eq!(metas[1].size, 7);
    }

    #[test]
    fn test_parse_list_response_empty() {
        let metas = parse_list_response("<ListBucketResult></ListBucketResult>").unwrap();
        assert!(metas.is_empty());
    }

    #[test]
    fn test_parse_list_response_unterminated() {
        assert!(parse_list_response("<Contents><Key>a</Key>").is_err());
    }
}
