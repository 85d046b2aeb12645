//! 🧠 In-memory destination: a bucket that lives and dies with the process.
//!
//! Objects land in an `Arc<Mutex<BTreeMap<key, bytes>>>` so tests can peek at
//! what arrived after the run hands the destination off. It also knows how
//! to misbehave on purpose: fail a write, fail a commit, or stall forever,
//! for any key containing a given needle. Chaos engineering, but polite. 🦆
//!
//! ⚠️ Not for production. If your backups are in RAM, they are not backups.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use crate::backends::{Destination, ObjectWriter, ObjectWriterBackend};

type ObjectVault = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

/// 💣 Which keys should go wrong, and how.
#[derive(Debug, Default, Clone)]
struct Sabotage {
    fail_write_on: Option<String>,
    fail_close_on: Option<String>,
    stall_on: Option<String>,
}

fn key_matches(needle: &Option<String>, key: &str) -> bool {
    needle.as_deref().is_some_and(|n| key.contains(n))
}

/// 🧠 A bucket made of heap.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemoryDestination {
    pub(crate) objects: ObjectVault,
    pub(crate) aborted: Arc<Mutex<Vec<String>>>,
    sabotage: Sabotage,
}

impl InMemoryDestination {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 💥 Any key containing `needle` fails on its first `write`.
    #[cfg(test)]
    pub(crate) fn failing_writes_on(mut self, needle: &str) -> Self {
        self.sabotage.fail_write_on = Some(needle.to_string());
        self
    }

    /// 💥 Any key containing `needle` streams fine and then fails to commit.
    #[cfg(test)]
    pub(crate) fn failing_closes_on(mut self, needle: &str) -> Self {
        self.sabotage.fail_close_on = Some(needle.to_string());
        self
    }

    /// 🐌 Any key containing `needle` hangs on `write` until someone gives up on it.
    #[cfg(test)]
    pub(crate) fn stalling_on(mut self, needle: &str) -> Self {
        self.sabotage.stall_on = Some(needle.to_string());
        self
    }

    /// 📸 Snapshot of everything committed so far.
    #[cfg(test)]
    pub(crate) async fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.objects.lock().await.clone()
    }
}

#[async_trait]
impl Destination for InMemoryDestination {
    async fn open_writer(&self, key: &str) -> Result<ObjectWriterBackend> {
        Ok(ObjectWriterBackend::InMemory(InMemoryObjectWriter {
            key: key.to_string(),
            buffer: Vec::new(),
            objects: self.objects.clone(),
            aborted: self.aborted.clone(),
            sabotage: self.sabotage.clone(),
        }))
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

/// ✍️ Buffers chunks until `close` drops them into the vault.
#[derive(Debug)]
pub(crate) struct InMemoryObjectWriter {
    key: String,
    buffer: Vec<u8>,
    objects: ObjectVault,
    aborted: Arc<Mutex<Vec<String>>>,
    sabotage: Sabotage,
}

#[async_trait]
impl ObjectWriter for InMemoryObjectWriter {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        if key_matches(&self.sabotage.stall_on, &self.key) {
            // 🐌 an hour is "forever" as far as any test timeout is concerned
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if key_matches(&self.sabotage.fail_write_on, &self.key) {
            bail!("💀 injected write failure for '{}'", self.key);
        }
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if key_matches(&self.sabotage.fail_close_on, &self.key) {
            bail!("💀 injected commit failure for '{}'", self.key);
        }
        trace!("🧠 committing {} bytes to '{}'", self.buffer.len(), self.key);
        let the_bytes = std::mem::take(&mut self.buffer);
        self.objects.lock().await.insert(self.key.clone(), the_bytes);
        Ok(())
    }

    async fn abort(&mut self) {
        self.buffer.clear();
        self.aborted.lock().await.push(self.key.clone());
    }
}
