//! 📂 Filesystem destination: a "bucket" that is just a directory you already own.
//!
//! Handy for NAS mounts, external drives, and for proving the engine works
//! without an AWS bill. Object keys become relative paths under `root`.
//! Bytes go to a `.stow-partial` sibling first and get renamed into place on
//! `close`, so a half-written file never wears the real name. 🦆
//!
//! 💀 Disk full → your problem now.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{trace, warn};

use crate::backends::{Destination, ObjectWriter, ObjectWriterBackend};

const PARTIAL_SUFFIX: &str = ".stow-partial";

/// 🔧 Where the mirror lives.
#[derive(Debug, Deserialize, Clone)]
pub struct FilesystemDestinationConfig {
    pub root: PathBuf,
}

/// 📂 Writes objects as plain files under a root directory.
#[derive(Debug)]
pub(crate) struct FilesystemDestination {
    root: PathBuf,
}

impl FilesystemDestination {
    /// 🚀 Creates the root directory if needed. A root we can't create is a fatal setup error.
    pub(crate) async fn new(config: FilesystemDestinationConfig) -> Result<Self> {
        fs::create_dir_all(&config.root).await.context(format!(
            "💀 Couldn't create destination directory '{}'. \
             The path stared back. It did not blink.",
            config.root.display()
        ))?;
        Ok(Self { root: config.root })
    }

    /// 🗺️ Map an object key to a path under `root`, refusing anything that climbs out.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let mut the_path = self.root.clone();
        for component in Path::new(key).components() {
            match component {
                Component::Normal(part) => the_path.push(part),
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    bail!("💀 Object key '{}' tries to escape the destination root", key)
                }
            }
        }
        if the_path == self.root {
            bail!("💀 Object key '{}' resolves to the destination root itself", key);
        }
        Ok(the_path)
    }
}

#[async_trait]
impl Destination for FilesystemDestination {
    async fn open_writer(&self, key: &str) -> Result<ObjectWriterBackend> {
        let final_path = self.resolve(key)?;
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context(format!("💀 Couldn't create '{}'", parent.display()))?;
        }

        let mut the_partial = final_path.clone().into_os_string();
        the_partial.push(PARTIAL_SUFFIX);
        let partial_path = PathBuf::from(the_partial);

        let file_handle = File::create(&partial_path)
            .await
            .context(format!("💀 Couldn't create '{}'", partial_path.display()))?;

        Ok(ObjectWriterBackend::Filesystem(FilesystemObjectWriter {
            file_buf: Some(BufWriter::new(file_handle)),
            partial_path,
            final_path,
        }))
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

/// ✍️ A BufWriter over the partial file, plus where it goes when it grows up.
#[derive(Debug)]
pub(crate) struct FilesystemObjectWriter {
    /// `None` once committed or aborted.
    file_buf: Option<BufWriter<File>>,
    partial_path: PathBuf,
    final_path: PathBuf,
}

#[async_trait]
impl ObjectWriter for FilesystemObjectWriter {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let file_buf = self
            .file_buf
            .as_mut()
            .context("💀 write after the object was already finished")?;
        file_buf.write_all(chunk).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut file_buf = self
            .file_buf
            .take()
            .context("💀 close after the object was already finished")?;
        let the_flush = file_buf.flush().await;
        drop(file_buf);

        let the_commit = match the_flush {
            Ok(()) => {
                trace!(
                    "📂 renaming '{}' into place at '{}'",
                    self.partial_path.display(),
                    self.final_path.display()
                );
                fs::rename(&self.partial_path, &self.final_path)
                    .await
                    .context(format!(
                        "💀 Couldn't move '{}' into place",
                        self.final_path.display()
                    ))
            }
            Err(err) => Err(err)
                .context(format!("💀 Error flushing '{}'", self.partial_path.display())),
        };

        // 🧹 a failed commit leaves nothing behind under either name
        if the_commit.is_err() {
            let _ = fs::remove_file(&self.partial_path).await;
        }
        the_commit
    }

    async fn abort(&mut self) {
        if self.file_buf.take().is_some() {
            if let Err(err) = fs::remove_file(&self.partial_path).await {
                warn!(
                    "⚠️ couldn't clean up partial file '{}': {}",
                    self.partial_path.display(),
                    err
                );
            }
        }
    }
}

impl Drop for FilesystemObjectWriter {
    fn drop(&mut self) {
        // 🧹 dropped mid-flight (timeout): the partial file is garbage now
        if self.file_buf.take().is_some() {
            let _ = std::fs::remove_file(&self.partial_path);
        }
    }
}
