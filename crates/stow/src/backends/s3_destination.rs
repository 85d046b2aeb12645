//! 🪣🚀 S3 Destination: the part where your files actually leave the machine.
//!
//! INT. NETWORK CARD. NIGHT. Bytes queue up single file. Each one has a key.
//! Each key starts with a timestamp. None of them know they're a backup yet.
//!
//! Talks to anything that speaks the S3 API: AWS itself, MinIO, R2, and Google
//! Cloud Storage through its XML interop endpoint (`https://storage.googleapis.com`
//! plus an HMAC key pair in the credential file).
//!
//! 🧠 Knowledge graph:
//! - `S3DestinationConfig`: bucket, credential file, region, endpoint, part size
//! - `S3Credentials`: the JSON credential artifact, loaded once at startup
//! - `S3Destination`: owns the SDK client, hands out writers
//! - `S3ObjectWriter`: buffers small objects into one `PutObject`, switches to
//!   multipart once a part's worth of bytes has piled up
//! - SDK retries are off. If a transfer fails, it fails once and gets counted.
//!
//! 🦆 The duck has no IAM role. The duck is at peace with this.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use serde::Deserialize;
use tracing::{debug, info, trace, warn};

use crate::backends::{Destination, ObjectWriter, ObjectWriterBackend};

/// 📏 S3 refuses multipart parts smaller than this (except the last one).
pub const MIN_PART_SIZE_BYTES: usize = 5 * 1024 * 1024;

// ============================================================
//  🔧 S3DestinationConfig
// ============================================================

/// 🔧 Configuration for the S3 destination.
#[derive(Debug, Deserialize, Clone)]
pub struct S3DestinationConfig {
    /// 🪣 Where everything goes
    pub bucket: String,
    /// 🔑 Path to the JSON credential artifact
    pub credentials_file: PathBuf,
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// 🌐 Custom endpoint for S3-compatible services. `None` means AWS.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// `bucket.host/key` vs `host/bucket/key`. MinIO and friends usually want path style.
    #[serde(default)]
    pub force_path_style: bool,
    /// 📦 Bytes per multipart part, and the threshold for going multipart at all
    #[serde(default = "default_multipart_part_size_bytes")]
    pub multipart_part_size_bytes: usize,
    /// 🩺 HEAD the bucket at startup so a typo fails the run before any file is touched
    #[serde(default = "default_verify_bucket")]
    pub verify_bucket: bool,
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

fn default_multipart_part_size_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_verify_bucket() -> bool {
    true
}

// ============================================================
//  🔑 S3Credentials
// ============================================================

/// 🔑 The credential artifact, as it sits on disk.
///
/// ```json
/// { "access_key_id": "AKIA...", "secret_access_key": "...", "session_token": null }
/// ```
#[derive(Deserialize, Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

// 🙈 never print the secret. not even in debug. especially not in debug.
impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl S3Credentials {
    /// 📖 Read and parse the credential file. Missing, empty, or malformed is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let the_raw = std::fs::read_to_string(path).context(format!(
            "💀 Credential file '{}' could not be read. Check the path and the permissions.",
            path.display()
        ))?;
        if the_raw.trim().is_empty() {
            bail!("💀 Credential file '{}' is empty", path.display());
        }
        let the_credentials: S3Credentials = serde_json::from_str(&the_raw).context(format!(
            "💀 Credential file '{}' isn't the JSON we expected \
             (access_key_id, secret_access_key, optional session_token)",
            path.display()
        ))?;
        if the_credentials.access_key_id.is_empty()
            || the_credentials.secret_access_key.is_empty()
        {
            bail!(
                "💀 Credential file '{}' has an empty access key or secret",
                path.display()
            );
        }
        Ok(the_credentials)
    }
}

// ============================================================
//  🪣 S3Destination
// ============================================================

/// 🪣 Owns the SDK client. `Client` is an `Arc` inside, so writers clone it freely.
#[derive(Debug)]
pub(crate) struct S3Destination {
    client: Client,
    config: S3DestinationConfig,
}

impl S3Destination {
    /// 🚀 Load credentials, build the client, optionally check the bucket answers.
    ///
    /// 💀 Fails if the credential file is bad or the bucket can't be reached.
    /// Either way nothing has been uploaded yet, which is the point.
    pub(crate) async fn new(config: S3DestinationConfig) -> Result<Self> {
        let the_credentials = S3Credentials::load(&config.credentials_file)?;

        let mut the_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                the_credentials.access_key_id,
                the_credentials.secret_access_key,
                the_credentials.session_token,
                None,
                "stow-credentials-file",
            ))
            .retry_config(RetryConfig::disabled())
            .force_path_style(config.force_path_style);
        if let Some(endpoint_url) = &config.endpoint_url {
            the_builder = the_builder.endpoint_url(endpoint_url);
        }
        let client = Client::from_conf(the_builder.build());

        let the_destination = Self { client, config };
        info!("☁️ S3 destination: {}", the_destination.describe());

        if the_destination.config.verify_bucket {
            the_destination
                .client
                .head_bucket()
                .bucket(&the_destination.config.bucket)
                .send()
                .await
                .context(format!(
                    "💀 HEAD bucket failed for s3://{}. The bucket ghosted us. \
                     Check: bucket name, region, endpoint, and credentials.",
                    the_destination.config.bucket
                ))?;
        }

        Ok(the_destination)
    }

    fn part_size(&self) -> usize {
        self.config.multipart_part_size_bytes.max(MIN_PART_SIZE_BYTES)
    }
}

#[async_trait]
impl Destination for S3Destination {
    async fn open_writer(&self, key: &str) -> Result<ObjectWriterBackend> {
        Ok(ObjectWriterBackend::S3(S3ObjectWriter {
            client: self.client.clone(),
            bucket: self.config.bucket.clone(),
            key: key.to_string(),
            part_size: self.part_size(),
            buffer: Vec::new(),
            upload_id: None,
            completed_parts: Vec::new(),
            finished: false,
        }))
    }

    fn describe(&self) -> String {
        match &self.config.endpoint_url {
            Some(endpoint) => format!("s3://{} via {}", self.config.bucket, endpoint),
            None => format!("s3://{} ({})", self.config.bucket, self.config.region),
        }
    }
}

// ============================================================
//  ✍️ S3ObjectWriter
// ============================================================

/// ✍️ One object on its way up.
///
/// Small objects never leave `buffer` until `close`, then go up as a single
/// `PutObject`. Once `buffer` reaches `part_size`, a multipart upload starts and
/// full parts are shipped as they fill.
pub(crate) struct S3ObjectWriter {
    client: Client,
    bucket: String,
    key: String,
    part_size: usize,
    buffer: Vec<u8>,
    upload_id: Option<String>,
    completed_parts: Vec<CompletedPart>,
    finished: bool,
}

impl std::fmt::Debug for S3ObjectWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectWriter")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("buffered", &self.buffer.len())
            .field("upload_id", &self.upload_id)
            .field("parts", &self.completed_parts.len())
            .finish()
    }
}

impl S3ObjectWriter {
    async fn ensure_multipart_started(&mut self) -> Result<String> {
        if let Some(upload_id) = &self.upload_id {
            return Ok(upload_id.clone());
        }
        let the_response = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .context(format!("💀 CreateMultipartUpload failed for '{}'", self.key))?;
        let upload_id = the_response
            .upload_id()
            .context("💀 CreateMultipartUpload came back without an upload id")?
            .to_string();
        debug!("📦 multipart upload {} started for '{}'", upload_id, self.key);
        self.upload_id = Some(upload_id.clone());
        Ok(upload_id)
    }

    async fn upload_part(&mut self, body: Vec<u8>) -> Result<()> {
        let upload_id = self.ensure_multipart_started().await?;
        let part_number = self.completed_parts.len() as i32 + 1;
        trace!("📦 part {} ({} bytes) for '{}'", part_number, body.len(), self.key);

        let the_response = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .context(format!("💀 UploadPart {} failed for '{}'", part_number, self.key))?;

        self.completed_parts.push(
            CompletedPart::builder()
                .e_tag(the_response.e_tag().unwrap_or_default())
                .part_number(part_number)
                .build(),
        );
        Ok(())
    }

    async fn finish_multipart(&mut self) -> Result<()> {
        // -- last part may be short, or empty if the buffer drained exactly on a boundary
        if !self.buffer.is_empty() {
            let the_tail = std::mem::take(&mut self.buffer);
            self.upload_part(the_tail).await?;
        }
        let upload_id = self.ensure_multipart_started().await?;
        let the_parts = std::mem::take(&mut self.completed_parts);

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(the_parts))
                    .build(),
            )
            .send()
            .await
            .context(format!("💀 CompleteMultipartUpload failed for '{}'", self.key))?;
        self.upload_id = None;
        Ok(())
    }

    async fn abort_multipart(&mut self) {
        if let Some(upload_id) = self.upload_id.take() {
            if let Err(err) = self
                .client
                .abort_multipart_upload()
                .bucket(&self.bucket)
                .key(&self.key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                warn!(
                    "⚠️ couldn't abort multipart upload {} for '{}': {}",
                    upload_id,
                    self.key,
                    aws_sdk_s3::error::DisplayErrorContext(&err)
                );
            }
        }
    }
}

#[async_trait]
impl ObjectWriter for S3ObjectWriter {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(chunk);
        while self.buffer.len() >= self.part_size {
            let the_rest = self.buffer.split_off(self.part_size);
            let the_part = std::mem::replace(&mut self.buffer, the_rest);
            self.upload_part(the_part).await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.finished {
            bail!("💀 '{}' was already finished", self.key);
        }
        self.finished = true;

        if self.upload_id.is_none() {
            let the_body = std::mem::take(&mut self.buffer);
            trace!("🪣 PutObject '{}' ({} bytes)", self.key, the_body.len());
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .body(ByteStream::from(the_body))
                .send()
                .await
                .context(format!("💀 PutObject failed for '{}'", self.key))?;
            return Ok(());
        }

        let the_result = self.finish_multipart().await;
        if the_result.is_err() {
            self.abort_multipart().await;
        }
        the_result
    }

    async fn abort(&mut self) {
        self.finished = true;
        self.buffer.clear();
        self.abort_multipart().await;
    }
}

impl Drop for S3ObjectWriter {
    fn drop(&mut self) {
        // 🧹 dropped with a multipart upload still open (timeout): abort it in the background
        let Some(upload_id) = self.upload_id.take() else {
            return;
        };
        let Ok(the_runtime) = tokio::runtime::Handle::try_current() else {
            warn!("⚠️ multipart upload {} for '{}' left dangling", upload_id, self.key);
            return;
        };
        let client = self.client.clone();
        let bucket = std::mem::take(&mut self.bucket);
        let key = std::mem::take(&mut self.key);
        the_runtime.spawn(async move {
            if let Err(err) = client
                .abort_multipart_upload()
                .bucket(&bucket)
                .key(&key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                warn!(
                    "⚠️ couldn't abort abandoned multipart upload {} for '{}': {}",
                    upload_id,
                    key,
                    aws_sdk_s3::error::DisplayErrorContext(&err)
                );
            }
        });
    }
}
