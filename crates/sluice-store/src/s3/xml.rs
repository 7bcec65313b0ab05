//! XML bodies returned by S3 nodes, parsed via `quick-xml` + `serde`.

use serde::Deserialize;

use crate::error::StoreError;

fn from_xml<'de, T: Deserialize<'de>>(body: &'de str) -> Result<T, StoreError> {
    quick_xml::de::from_str(body).map_err(|e| StoreError::InvalidResponse(e.to_string()))
}

// -----------------------------------------------------------------------
// Error
// -----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename = "Error")]
pub(crate) struct ErrorBody {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message", default)]
    pub message: String,
}

pub(crate) fn parse_error(body: &str) -> Option<ErrorBody> {
    if body.trim().is_empty() {
        return None;
    }
    from_xml(body).ok()
}

// -----------------------------------------------------------------------
// ListAllMyBucketsResult (GET /)
// -----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ListAllMyBucketsResult {
    #[serde(rename = "Buckets", default)]
    buckets: Buckets,
}

#[derive(Debug, Default, Deserialize)]
struct Buckets {
    #[serde(rename = "Bucket", default)]
    bucket: Vec<BucketEntry>,
}

#[derive(Debug, Deserialize)]
struct BucketEntry {
    #[serde(rename = "Name")]
    name: String,
}

pub(crate) fn parse_bucket_names(body: &str) -> Result<Vec<String>, StoreError> {
    let result: ListAllMyBucketsResult = from_xml(body)?;
    Ok(result.buckets.bucket.into_iter().map(|b| b.name).collect())
}

// -----------------------------------------------------------------------
// ListBucketResult (GET /{bucket}?list-type=2)
// -----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct ListBucketResult {
    #[serde(rename = "IsTruncated", default)]
    pub is_truncated: bool,
    #[serde(rename = "NextContinuationToken", default)]
    pub next_continuation_token: Option<String>,
    #[serde(rename = "Contents", default)]
    pub contents: Vec<Contents>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Contents {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Size", default)]
    pub size: u64,
    #[serde(rename = "ETag", default)]
    pub etag: Option<String>,
}

pub(crate) fn parse_list_objects(body: &str) -> Result<ListBucketResult, StoreError> {
    from_xml(body)
}
