//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from bsync-core.

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
};
use aws_smithy_types::timeout::TimeoutConfig;
use tracing::{debug, warn};

use bsync_core::{Error, ListOptions, ListResult, ObjectInfo, ObjectStore, Profile, Result};

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    region: String,
}

impl S3Client {
    /// Create a new S3 client from a profile
    pub async fn new(profile: &Profile) -> Result<Self> {
        let credentials = aws_credential_types::Credentials::new(
            profile.access_key.clone(),
            profile.secret_key.clone(),
            None, // session token
            None, // expiry
            "bsync-static-credentials",
        );

        let timeouts = TimeoutConfig::builder()
            .connect_timeout(profile.connect_timeout())
            .read_timeout(profile.read_timeout())
            .build();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(profile.region.clone()))
            .timeout_config(timeouts);
        if let Some(endpoint) = &profile.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(profile.force_path_style())
            .build();

        debug!(
            profile = %profile.name,
            region = %profile.region,
            endpoint = profile.endpoint.as_deref().unwrap_or("default"),
            path_style = profile.force_path_style(),
            "Created S3 client"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            region: profile.region.clone(),
        })
    }
}

/// Map an S3 error code or HTTP status onto the core error taxonomy
fn classify(code: Option<&str>, status: Option<u16>, subject: &str, detail: String) -> Error {
    match (code, status) {
        (Some("NoSuchKey" | "NoSuchBucket" | "NotFound"), _) | (_, Some(404)) => {
            Error::NotFound(subject.to_string())
        }
        (Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"), _)
        | (None, Some(403)) => Error::Auth(detail),
        (Some("BucketAlreadyExists" | "BucketAlreadyOwnedByYou" | "BucketNotEmpty"), _)
        | (None, Some(409)) => Error::Conflict(detail),
        _ => Error::Network(detail),
    }
}

fn sdk_error<E>(err: SdkError<E, HttpResponse>, subject: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.code().map(str::to_string);
    classify(
        code.as_deref(),
        status,
        subject,
        DisplayErrorContext(&err).to_string(),
    )
}

fn timestamp(value: &aws_smithy_types::DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::from_second(value.secs()).ok()
}

fn content_type_for(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_buckets(&self) -> Result<Vec<ObjectInfo>> {
        let response = self
            .inner
            .list_buckets()
            .send()
            .await
            .map_err(|e| sdk_error(e, "buckets"))?;

        let buckets = response
            .buckets()
            .iter()
            .map(|b| {
                let mut info = ObjectInfo::bucket(b.name().unwrap_or_default());
                info.last_modified = b.creation_date().and_then(timestamp);
                info
            })
            .collect();

        Ok(buckets)
    }

    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListResult> {
        let mut request = self.inner.list_objects_v2().bucket(bucket);

        if let Some(prefix) = &options.prefix {
            request = request.prefix(prefix);
        }

        // Set delimiter (for non-recursive listing)
        if !options.recursive {
            request = request.delimiter(options.delimiter.as_deref().unwrap_or("/"));
        }

        if let Some(max) = options.max_keys {
            request = request.max_keys(max);
        }

        if let Some(token) = &options.continuation_token {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| sdk_error(e, &format!("bucket {bucket}")))?;

        let mut items = Vec::new();

        // Common prefixes come back as directories
        for prefix in response.common_prefixes() {
            if let Some(p) = prefix.prefix() {
                items.push(ObjectInfo::dir(p));
            }
        }

        for object in response.contents() {
            let key = object.key().unwrap_or_default();
            let mut info = ObjectInfo::file(key, object.size().unwrap_or(0));
            info.last_modified = object.last_modified().and_then(timestamp);
            info.etag = object.e_tag().map(|etag| etag.trim_matches('"').to_string());
            items.push(info);
        }

        Ok(ListResult {
            items,
            truncated: response.is_truncated().unwrap_or(false),
            continuation_token: response.next_continuation_token().map(str::to_string),
        })
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.inner.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => match sdk_error(e, bucket) {
                Error::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut request = self.inner.create_bucket().bucket(bucket);

        // us-east-1 rejects an explicit location constraint
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|e| sdk_error(e, &format!("bucket {bucket}")))?;

        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.inner
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| sdk_error(e, &format!("bucket {bucket}")))?;

        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(e, &format!("{bucket}/{key}")))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Network(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<ObjectInfo> {
        let size = data.len() as i64;
        let content_type = content_type_for(key);

        let response = self
            .inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(&content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| sdk_error(e, &format!("{bucket}/{key}")))?;

        let mut info = ObjectInfo::file(key, size);
        info.etag = response.e_tag().map(|etag| etag.trim_matches('"').to_string());
        info.content_type = Some(content_type);
        info.last_modified = Some(jiff::Timestamp::now());

        Ok(info)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(e, &format!("{bucket}/{key}")))?;

        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<Vec<String>> {
        if keys.is_empty() {
            return Ok(vec![]);
        }

        let objects = keys
            .into_iter()
            .map(|k| {
                ObjectIdentifier::builder()
                    .key(k)
                    .build()
                    .map_err(|e| Error::General(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(false)
            .build()
            .map_err(|e| Error::General(e.to_string()))?;

        let response = self
            .inner
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| sdk_error(e, &format!("bucket {bucket}")))?;

        let deleted: Vec<String> = response
            .deleted()
            .iter()
            .filter_map(|d| d.key().map(str::to_string))
            .collect();

        if !response.errors().is_empty() {
            let failed: Vec<&str> = response.errors().iter().filter_map(|e| e.key()).collect();
            warn!(bucket, ?failed, "Failed to delete some objects");
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail() -> String {
        "service error".to_string()
    }

    #[test]
    fn test_missing_things_are_not_found() {
        for code in ["NoSuchKey", "NoSuchBucket", "NotFound"] {
            let err = classify(Some(code), Some(404), "b/k", detail());
            assert!(matches!(err, Error::NotFound(ref s) if s == "b/k"));
        }
        // HEAD responses carry no body, so only the status is known
        assert!(matches!(
            classify(None, Some(404), "b", detail()),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn test_credential_problems_are_auth() {
        for code in ["AccessDenied", "InvalidAccessKeyId", "SignatureDoesNotMatch"] {
            assert!(matches!(
                classify(Some(code), Some(403), "b", detail()),
                Error::Auth(_)
            ));
        }
        assert!(matches!(classify(None, Some(403), "b", detail()), Error::Auth(_)));
    }

    #[test]
    fn test_bucket_state_is_conflict() {
        for code in ["BucketAlreadyExists", "BucketAlreadyOwnedByYou", "BucketNotEmpty"] {
            let err = classify(Some(code), Some(409), "b", detail());
            assert_eq!(err.exit_code(), 6);
        }
    }

    #[test]
    fn test_everything_else_is_network() {
        assert!(matches!(
            classify(Some("SlowDown"), Some(503), "b", detail()),
            Error::Network(_)
        ));
        assert!(matches!(classify(None, None, "b", detail()), Error::Network(_)));
    }

    #[test]
    fn test_content_type_from_key() {
        assert_eq!(content_type_for("img/1.png"), "image/png");
        assert_eq!(content_type_for("site/index.html"), "text/html");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_client_from_profile() {
        let profile =
            Profile::new("local", "access", "secret").with_endpoint("http://localhost:9000");
        assert!(S3Client::new(&profile).await.is_ok());
    }
}
