//! 🔌 Backends: where bytes leave the building.
//!
//! 🚰 A `Destination` hands out `ObjectWriter`s, one per object key. A writer
//! takes chunks, then either commits them with `close()` or throws them away
//! with `abort()`. That's the whole contract. Two verbs and a bailout.
//!
//! 🎭 Like the sink side of a pipeline, the concrete backend hides behind an
//! enum (`DestinationBackend` / `ObjectWriterBackend`), so the workers never
//! learn whether their bytes went to S3, a local directory, or a `HashMap`
//! that will be gone the moment the test ends.
//!
//! 🦆 The duck does not have bucket permissions. The duck never asked.

use anyhow::Result;
use async_trait::async_trait;

use crate::app_config::DestinationConfig;

pub(crate) mod filesystem_destination;
pub(crate) mod in_mem_destination;
pub(crate) mod s3_destination;

pub use filesystem_destination::FilesystemDestinationConfig;
pub use s3_destination::{S3Credentials, S3DestinationConfig};

pub(crate) use filesystem_destination::{FilesystemDestination, FilesystemObjectWriter};
pub(crate) use in_mem_destination::{InMemoryDestination, InMemoryObjectWriter};
pub(crate) use s3_destination::{S3Destination, S3ObjectWriter};

// ===== Destination Trait and Backend Enum =====

/// 🪣 Somewhere objects can be written.
///
/// Shared read-only across every worker, so `&self` only. Anything mutable
/// lives in the writers it hands out.
#[async_trait]
pub(crate) trait Destination: std::fmt::Debug + Send + Sync {
    /// 📝 Start a new object under `key`. Nothing is visible until the writer is closed.
    async fn open_writer(&self, key: &str) -> Result<ObjectWriterBackend>;

    /// 🏷️ Human-readable target, for logs and the summary.
    fn describe(&self) -> String;
}

/// ✍️ A single in-flight object.
///
/// # Contract
/// - `write` may be called any number of times, chunks land in order.
/// - `close` commits. After a successful close the object exists remotely.
/// - `abort` releases whatever `write` built up. Never fails, only logs.
/// - Exactly one of `close`/`abort` is called per writer. Dropping a writer
///   without either must not leak remote state.
#[async_trait]
pub(crate) trait ObjectWriter: std::fmt::Debug + Send {
    async fn write(&mut self, chunk: &[u8]) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
    async fn abort(&mut self);
}

/// 🎭 The many faces of a Destination.
#[derive(Debug)]
pub(crate) enum DestinationBackend {
    S3(S3Destination),
    Filesystem(FilesystemDestination),
    InMemory(InMemoryDestination),
}

impl DestinationBackend {
    /// 🏗️ Build the destination described by config. Failures here are fatal for the run.
    pub(crate) async fn from_config(config: &DestinationConfig) -> Result<Self> {
        Ok(match config {
            DestinationConfig::S3(s3_config) => {
                DestinationBackend::S3(S3Destination::new(s3_config.clone()).await?)
            }
            DestinationConfig::Filesystem(fs_config) => {
                DestinationBackend::Filesystem(FilesystemDestination::new(fs_config.clone()).await?)
            }
            DestinationConfig::InMemory => DestinationBackend::InMemory(InMemoryDestination::new()),
        })
    }
}

#[async_trait]
impl Destination for DestinationBackend {
    async fn open_writer(&self, key: &str) -> Result<ObjectWriterBackend> {
        match self {
            DestinationBackend::S3(d) => d.open_writer(key).await,
            DestinationBackend::Filesystem(d) => d.open_writer(key).await,
            DestinationBackend::InMemory(d) => d.open_writer(key).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            DestinationBackend::S3(d) => d.describe(),
            DestinationBackend::Filesystem(d) => d.describe(),
            DestinationBackend::InMemory(d) => d.describe(),
        }
    }
}

// ===== ObjectWriter Backend Enum =====

/// 🎭 The many faces of an in-flight object. Mirrors `DestinationBackend` one-to-one.
#[derive(Debug)]
pub(crate) enum ObjectWriterBackend {
    S3(S3ObjectWriter),
    Filesystem(FilesystemObjectWriter),
    InMemory(InMemoryObjectWriter),
}

#[async_trait]
impl ObjectWriter for ObjectWriterBackend {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        match self {
            ObjectWriterBackend::S3(w) => w.write(chunk).await,
            ObjectWriterBackend::Filesystem(w) => w.write(chunk).await,
            ObjectWriterBackend::InMemory(w) => w.write(chunk).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            ObjectWriterBackend::S3(w) => w.close().await,
            ObjectWriterBackend::Filesystem(w) => w.close().await,
            ObjectWriterBackend::InMemory(w) => w.close().await,
        }
    }

    async fn abort(&mut self) {
        match self {
            ObjectWriterBackend::S3(w) => w.abort().await,
            ObjectWriterBackend::Filesystem(w) => w.abort().await,
            ObjectWriterBackend::InMemory(w) => w.abort().await,
        }
    }
}
