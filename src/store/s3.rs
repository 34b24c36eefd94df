//! S3 REST adapter with AWS Signature V4 request signing.
//!
//! Speaks ListObjectsV2 / GetObject / PutObject directly over `reqwest`.
//! Virtual-host addressing against AWS; path-style when a custom endpoint
//! (e.g. MinIO) is configured.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use regex::Regex;
use sha2::{Digest, Sha256};

use async_trait::async_trait;

use crate::config::S3Config;
use crate::error::StoreError;
use crate::store::ObjectStore;

const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

pub struct S3ObjectStore {
    http: reqwest::Client,
    config: S3Config,
}

impl S3ObjectStore {
    pub fn new(config: S3Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Scheme, host header value and root path for a bucket. AWS buckets are
    /// addressed virtual-host style; custom endpoints use path style.
    fn target(&self, bucket: &str) -> (String, String, String) {
        match &self.config.endpoint {
            Some(endpoint) => {
                let (scheme, host) = match endpoint.split_once("://") {
                    Some((scheme, host)) => (scheme.to_string(), host.to_string()),
                    None => ("https".to_string(), endpoint.clone()),
                };
                let host = host.trim_end_matches('/').to_string();
                (scheme, host, format!("/{bucket}"))
            }
            None => (
                "https".to_string(),
                format!("{bucket}.s3.{}.amazonaws.com", self.config.region),
                String::new(),
            ),
        }
    }

    async fn send(
        &self,
        method: reqwest::Method,
        bucket: &str,
        key: &str,
        query: &[(String, String)],
        body: Vec<u8>,
        operation: &'static str,
    ) -> Result<reqwest::Response, StoreError> {
        let (scheme, host, root) = self.target(bucket);

        let canonical_uri = if key.is_empty() {
            if root.is_empty() {
                "/".to_string()
            } else {
                root.clone()
            }
        } else {
            format!("{root}/{}", encode_path(key))
        };
        let canonical_query = canonical_query_string(query);

        let payload_hash = if body.is_empty() {
            EMPTY_PAYLOAD_SHA256.to_string()
        } else {
            hex::encode(Sha256::digest(&body))
        };

        let now = Utc::now();
        let headers = self.sign(
            method.as_str(),
            &host,
            &canonical_uri,
            &canonical_query,
            &payload_hash,
            now,
        );

        let mut url = format!("{scheme}://{host}{canonical_uri}");
        if !canonical_query.is_empty() {
            url.push('?');
            url.push_str(&canonical_query);
        }

        let mut request = self.http.request(method, &url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::UnexpectedStatus {
                operation,
                key: key.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Signature V4 headers for one request, including `Authorization`.
    fn sign(
        &self,
        method: &str,
        host: &str,
        canonical_uri: &str,
        canonical_query: &str,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let mut headers = vec![
            ("host".to_string(), host.to_string()),
            (
                "x-amz-content-sha256".to_string(),
                payload_hash.to_string(),
            ),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(token) = &self.config.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
        );

        let scope = format!("{date}/{}/s3/aws4_request", self.config.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(
            &self.config.secret_access_key,
            &date,
            &self.config.region,
            "s3",
        );
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.config.access_key_id
        );

        // The host header is set by the HTTP client from the URL; everything
        // else goes on the request explicitly.
        let mut out: Vec<(String, String)> = headers
            .into_iter()
            .filter(|(name, _)| name != "host")
            .collect();
        out.push(("authorization".to_string(), authorization));
        out
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut query = vec![
                ("list-type".to_string(), "2".to_string()),
                ("prefix".to_string(), prefix.to_string()),
            ];
            if let Some(token) = &continuation {
                query.push(("continuation-token".to_string(), token.clone()));
            }

            let response = self
                .send(reqwest::Method::GET, bucket, "", &query, Vec::new(), "list")
                .await?;
            let xml = response.text().await?;

            keys.extend(extract_tag_values(&xml, "Key"));

            if xml.contains("<IsTruncated>true</IsTruncated>") {
                continuation = extract_tag_values(&xml, "NextContinuationToken")
                    .into_iter()
                    .next();
                if continuation.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(keys)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let response = self
            .send(reqwest::Method::GET, bucket, key, &[], Vec::new(), "get")
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.send(reqwest::Method::PUT, bucket, key, &[], body, "put")
            .await?;
        Ok(())
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// SigV4 key derivation chain over the secret, date, region and service.
fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encodes an object key path, segment by segment, keeping '/' literal.
fn encode_path(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Canonical (and wire) query string: pairs percent-encoded and sorted by
/// encoded name.
fn canonical_query_string(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(name, value)| {
            (
                urlencoding::encode(name).into_owned(),
                urlencoding::encode(value).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Pulls the text content of every `<tag>...</tag>` element out of a listing
/// response, with the five XML entities unescaped.
fn extract_tag_values(xml: &str, tag: &str) -> Vec<String> {
    let pattern = format!("<{tag}>([^<]*)</{tag}>");
    let re = Regex::new(&pattern).expect("static listing pattern");
    re.captures_iter(xml)
        .map(|captures| xml_unescape(&captures[1]))
        .collect()
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
