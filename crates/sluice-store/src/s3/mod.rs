//! S3 REST backend over `reqwest`.
//!
//! Requests are path-style (`http://host:port/{bucket}/{key}`) and signed with
//! AWS Signature V4. Bodies are streamed in both directions.

mod sigv4;
mod xml;

use chrono::Utc;
use futures::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, HOST};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use sluice_types::{Credentials, NodeEndpoint};
use tracing::{debug, trace};

use crate::error::StoreError;
use crate::traits::{ByteStream, ObjectInfo, StorageBackend};

/// Header MinIO honors to remove an object without a version check.
const FORCE_DELETE_HEADER: &str = "x-minio-force-delete";

/// Storage backend speaking the S3 REST API to one node.
pub struct S3Backend {
    client: Client,
    base_url: String,
    host: String,
    credentials: Credentials,
    region: String,
}

impl S3Backend {
    /// Build a backend for `endpoint` with a fresh HTTP client.
    pub fn new(
        endpoint: NodeEndpoint,
        credentials: Credentials,
        region: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(concat!("sluice/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, endpoint, credentials, region))
    }

    /// Build a backend sharing an existing HTTP client.
    pub fn with_client(
        client: Client,
        endpoint: NodeEndpoint,
        credentials: Credentials,
        region: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: endpoint.http_url(),
            host: endpoint.socket_addr().to_string(),
            credentials,
            region: region.into(),
        }
    }

    /// Create a signed request for `path` (unencoded, starting with `/`).
    fn request(&self, method: Method, path: &str, query: &[(&str, &str)]) -> RequestBuilder {
        let signed = sigv4::sign(
            &self.credentials,
            &self.region,
            &sigv4::RequestParts {
                method: method.as_str(),
                path,
                query,
                host: &self.host,
            },
            Utc::now(),
        );

        let mut url = format!("{}{}", self.base_url, encode_path(path));
        if !query.is_empty() {
            url.push('?');
            url.push_str(&sigv4::canonical_query(query));
        }
        trace!(%method, %url, "s3 request");

        self.client
            .request(method, url)
            .header(HOST, &self.host)
            .header("x-amz-content-sha256", sigv4::UNSIGNED_PAYLOAD)
            .header("x-amz-date", signed.amz_date)
            .header("authorization", signed.authorization)
    }

    fn bucket_path(bucket: &str) -> String {
        format!("/{bucket}")
    }

    fn object_path(bucket: &str, key: &str) -> String {
        format!("/{bucket}/{key}")
    }
}

#[async_trait::async_trait]
impl StorageBackend for S3Backend {
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        let resp = self.request(Method::GET, "/", &[]).send().await?;
        let resp = check(resp, None, None).await?;
        xml::parse_bucket_names(&resp.text().await?)
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        let resp = self
            .request(Method::HEAD, &Self::bucket_path(bucket), &[])
            .send()
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            _ => check(resp, Some(bucket), None).await.map(|_| true),
        }
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let resp = self
            .request(Method::PUT, &Self::bucket_path(bucket), &[])
            .header(CONTENT_LENGTH, 0)
            .send()
            .await?;
        check(resp, Some(bucket), None).await?;
        debug!(bucket, "created bucket on node");
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        length: u64,
    ) -> Result<(), StoreError> {
        let resp = self
            .request(Method::PUT, &Self::object_path(bucket, key), &[])
            .header(CONTENT_LENGTH, length)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await?;
        check(resp, Some(bucket), Some(key)).await?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream, StoreError> {
        let resp = self
            .request(Method::GET, &Self::object_path(bucket, key), &[])
            .send()
            .await?;
        let resp = check(resp, Some(bucket), Some(key)).await?;
        Ok(Box::pin(resp.bytes_stream().map_err(StoreError::from)))
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo, StoreError> {
        let resp = self
            .request(Method::HEAD, &Self::object_path(bucket, key), &[])
            .send()
            .await?;
        let resp = check(resp, Some(bucket), Some(key)).await?;

        let headers = resp.headers();
        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| StoreError::InvalidResponse("missing content-length on HEAD".into()))?;
        let etag = headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());

        Ok(ObjectInfo {
            key: key.to_string(),
            size,
            etag,
        })
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let resp = self
            .request(Method::DELETE, &Self::object_path(bucket, key), &[])
            .header(FORCE_DELETE_HEADER, "true")
            .send()
            .await?;
        match check(resp, Some(bucket), Some(key)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_object_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let path = Self::bucket_path(bucket);
        let mut objects = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut query = vec![("list-type", "2")];
            if let Some(t) = token.as_deref() {
                query.push(("continuation-token", t));
            }

            let resp = self.request(Method::GET, &path, &query).send().await?;
            let resp = check(resp, Some(bucket), None).await?;
            let page = xml::parse_list_objects(&resp.text().await?)?;

            objects.extend(page.contents.into_iter().map(|c| ObjectInfo {
                key: c.key,
                size: c.size,
                etag: c.etag.map(|e| e.trim_matches('"').to_string()),
            }));

            match page.next_continuation_token {
                Some(next) if page.is_truncated => token = Some(next),
                _ => break,
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}

/// Pass successful responses through; turn error responses into [`StoreError`].
async fn check(
    resp: Response,
    bucket: Option<&str>,
    key: Option<&str>,
) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    // HEAD responses carry no body, so fall back to the status code.
    let body = resp.text().await.unwrap_or_default();
    let (code, message) = match xml::parse_error(&body) {
        Some(err) => (err.code, err.message),
        None => (
            fallback_code(status, key.is_some()).to_string(),
            status.canonical_reason().unwrap_or("").to_string(),
        ),
    };

    Err(classify(status, code, message, bucket, key))
}

fn fallback_code(status: StatusCode, has_key: bool) -> &'static str {
    match status {
        StatusCode::NOT_FOUND if has_key => "NoSuchKey",
        StatusCode::NOT_FOUND => "NoSuchBucket",
        StatusCode::FORBIDDEN => "AccessDenied",
        StatusCode::CONFLICT => "BucketAlreadyOwnedByYou",
        _ => "InternalError",
    }
}

fn classify(
    status: StatusCode,
    code: String,
    message: String,
    bucket: Option<&str>,
    key: Option<&str>,
) -> StoreError {
    let bucket = bucket.unwrap_or_default().to_string();
    match code.as_str() {
        "NoSuchBucket" => StoreError::NoSuchBucket { bucket },
        "NoSuchKey" => StoreError::NoSuchKey {
            bucket,
            key: key.unwrap_or_default().to_string(),
        },
        "AccessDenied" => StoreError::AccessDenied { message },
        "BucketAlreadyOwnedByYou" | "BucketAlreadyExists" => {
            StoreError::BucketAlreadyOwned { bucket }
        }
        _ => StoreError::Backend {
            status: status.as_u16(),
            code,
            message,
        },
    }
}

/// Percent-encode each segment of a path for use in a URL.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(sigv4::percent_encode)
        .collect::<Vec<_>>()
        .join("/")
}
