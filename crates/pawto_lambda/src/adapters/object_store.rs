use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use thiserror::Error;

use super::block_on;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("failed to write object '{key}': {message}")]
    Write { key: String, message: String },
    #[error("failed to delete object '{key}': {message}")]
    Delete { key: String, message: String },
    #[error("failed to list objects under '{prefix}': {message}")]
    List { prefix: String, message: String },
    #[error("failed to presign object '{key}': {message}")]
    Presign { key: String, message: String },
}

pub trait ObjectStore {
    fn write_object(&self, key: &str, body: &[u8], content_type: &str)
        -> Result<(), ObjectStoreError>;

    fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError>;

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError>;

    /// Time-limited GET URL for `key`.
    fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, ObjectStoreError>;
}

pub struct S3ObjectStore {
    bucket: String,
    s3_client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(bucket: impl Into<String>, s3_client: aws_sdk_s3::Client) -> Self {
        Self {
            bucket: bucket.into(),
            s3_client,
        }
    }
}

impl ObjectStore for S3ObjectStore {
    fn write_object(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let request = self
            .s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body.to_vec()));

        block_on(request.send())
            .map(|_| ())
            .map_err(|error| ObjectStoreError::Write {
                key: key.to_string(),
                message: error.to_string(),
            })
    }

    fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        let request = self
            .s3_client
            .delete_object()
            .bucket(&self.bucket)
            .key(key);

        block_on(request.send())
            .map(|_| ())
            .map_err(|error| ObjectStoreError::Delete {
                key: key.to_string(),
                message: error.to_string(),
            })
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let client = self.s3_client.clone();
        let bucket = self.bucket.clone();
        let prefix_owned = prefix.to_string();

        block_on(async move {
            let mut keys = Vec::new();
            let mut continuation_token: Option<String> = None;
            loop {
                let output = client
                    .list_objects_v2()
                    .bucket(&bucket)
                    .prefix(&prefix_owned)
                    .set_continuation_token(continuation_token.take())
                    .send()
                    .await
                    .map_err(|error| ObjectStoreError::List {
                        prefix: prefix_owned.clone(),
                        message: error.to_string(),
                    })?;

                keys.extend(
                    output
                        .contents()
                        .iter()
                        .filter_map(|object| object.key().map(str::to_string)),
                );

                match output.next_continuation_token() {
                    Some(token) if output.is_truncated().unwrap_or(false) => {
                        continuation_token = Some(token.to_string());
                    }
                    _ => break,
                }
            }
            Ok(keys)
        })
    }

    fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, ObjectStoreError> {
        let presign_error = |message: String| ObjectStoreError::Presign {
            key: key.to_string(),
            message,
        };
        let config =
            PresigningConfig::expires_in(expires_in).map_err(|error| presign_error(error.to_string()))?;
        let request = self
            .s3_client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config);

        block_on(request)
            .map(|presigned| presigned.uri().to_string())
            .map_err(|error| presign_error(error.to_string()))
    }
}
