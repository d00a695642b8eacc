use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream as AwsByteStream, Client};
use bytes::Bytes;
use optima_core::ConfigSnapshot;
use tracing::debug;

use crate::{
    BlobError, BlobInfo, BlobResult, BlobStore, ByteStream, GetResult, ObjectHead, PutResult,
};

/// Connection settings for an S3-compatible endpoint (AWS, MinIO,
/// LocalStack, RustFS)
#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub force_path_style: bool,
}

impl S3Config {
    /// Read `s3.*` keys. Region and credentials are required.
    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> BlobResult<Self> {
        fn required(snapshot: &ConfigSnapshot, key: &str) -> BlobResult<String> {
            snapshot
                .get_string(key)
                .ok_or_else(|| BlobError::invalid(format!("{key} configuration value required")))
        }

        Ok(Self {
            region: required(snapshot, "s3.region")?,
            endpoint_url: snapshot.get_string("s3.endpoint_url"),
            access_key_id: required(snapshot, "s3.access_key_id")?,
            secret_access_key: required(snapshot, "s3.secret_access_key")?,
            force_path_style: snapshot.get_bool("s3.force_path_style").unwrap_or(true),
        })
    }
}

/// Production store backed by the AWS SDK
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
}

impl S3CompatibleStore {
    pub async fn new(config: S3Config) -> Self {
        Self {
            client: Self::create_client(config).await,
        }
    }

    /// Use an already configured client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn create_client(config: S3Config) -> Client {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "optima",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);
        if let Some(endpoint) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let aws_config = loader.load().await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(config.force_path_style)
                .build(),
        )
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> BlobError {
        BlobError::backend(err)
    }
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> BlobResult<PutResult> {
        let size_bytes = body.len() as u64;
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(AwsByteStream::from(body));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        let result = request.send().await.map_err(Self::map_aws_error)?;
        debug!(bucket, key, size_bytes, "object stored");

        Ok(PutResult {
            etag: result.e_tag,
            size_bytes,
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> BlobResult<GetResult> {
        let result = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(result) => result,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    return Err(BlobError::not_found(bucket, key));
                }
                return Err(Self::map_aws_error(service_err));
            }
        };

        let size_bytes = result.content_length.unwrap_or(0) as u64;
        let mut body = result.body;
        let stream: ByteStream = Box::pin(async_stream::stream! {
            loop {
                match body.try_next().await {
                    Ok(Some(chunk)) => yield Ok(chunk),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(std::io::Error::other(e));
                        break;
                    }
                }
            }
        });

        Ok(GetResult {
            stream,
            size_bytes,
            content_type: result.content_type,
            etag: result.e_tag,
        })
    }

    async fn head(&self, bucket: &str, key: &str) -> BlobResult<ObjectHead> {
        let result = match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(result) => result,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    return Err(BlobError::not_found(bucket, key));
                }
                return Err(Self::map_aws_error(service_err));
            }
        };

        Ok(ObjectHead {
            size_bytes: result.content_length.unwrap_or(0) as u64,
            content_type: result.content_type,
            etag: result.e_tag,
            last_modified: result.last_modified.map(|dt| dt.secs()),
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> BlobResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> BlobResult<bool> {
        match self.head(bucket, key).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn bucket_exists(&self, bucket: &str) -> BlobResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(Self::map_aws_error(service_err))
                }
            }
        }
    }

    async fn list(&self, bucket: &str, prefix: Option<&str>) -> BlobResult<Vec<BlobInfo>> {
        let mut blobs = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);
            if let Some(prefix) = prefix {
                request = request.prefix(prefix);
            }
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let result = request.send().await.map_err(Self::map_aws_error)?;
            for object in result.contents.unwrap_or_default() {
                if let Some(key) = object.key {
                    blobs.push(BlobInfo {
                        key,
                        size_bytes: object.size.unwrap_or(0) as u64,
                        last_modified: object.last_modified.map(|dt| dt.secs()),
                    });
                }
            }

            match result.next_continuation_token {
                Some(token) if result.is_truncated.unwrap_or(false) => continuation = Some(token),
                _ => break,
            }
        }

        Ok(blobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optima_core::OptimaConfig;

    #[test]
    fn config_requires_credentials() {
        let mut config = OptimaConfig::new();
        config.set("s3.region", "eu-central-1");
        assert!(S3Config::from_snapshot(&config.snapshot()).is_err());

        config.set("s3.access_key_id", "test");
        config.set("s3.secret_access_key", "test");
        config.set("s3.endpoint_url", "http://localhost:4566");
        let s3 = S3Config::from_snapshot(&config.snapshot()).unwrap();
        assert_eq!(s3.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert!(s3.force_path_style);
    }
}
