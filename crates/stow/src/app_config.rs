//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment. `STOW_*` environment variables form the base layer,
//! the TOML file goes on top and wins on conflicts. Nested keys use a double
//! underscore: `STOW_RUNTIME__BATCH_SIZE=50`.
//!
//! Everything here is setup. A failure in this module means the run never
//! starts, the process exits non-zero, and no summary gets printed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::{FilesystemDestinationConfig, S3DestinationConfig};
use crate::common::KeyStyle;
use crate::partition::DEFAULT_BATCH_SIZE;

/// 📦 One struct to rule them all.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📂 Roots to back up, walked in order
    pub directories: Vec<PathBuf>,
    /// 🪣 Where the bytes go
    pub destination: DestinationConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 🎭 Which backend receives the objects.
///
/// ```toml
/// [destination.S3]
/// bucket = "my-backups"
/// credentials_file = "/etc/stow/credentials.json"
/// ```
#[derive(Debug, Deserialize, Clone)]
pub enum DestinationConfig {
    S3(S3DestinationConfig),
    Filesystem(FilesystemDestinationConfig),
    /// 🧠 Nothing leaves RAM. Useful for dry runs and tests.
    InMemory,
}

/// ⚙️ Knobs for the upload engine itself.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// 📦 Files per worker. Worker count is `round(files / batch_size)`, at least 1.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// ⏱️ Budget for one file's transfer, in seconds. Per file, not per worker.
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
    #[serde(default)]
    pub key_style: KeyStyle,
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_transfer_timeout_secs() -> u64 {
    50
}

fn default_show_progress() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            transfer_timeout_secs: default_transfer_timeout_secs(),
            key_style: KeyStyle::default(),
            show_progress: default_show_progress(),
        }
    }
}

impl RuntimeConfig {
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }
}

/// 🩺 A file that must exist and must not be empty. Config files and credential files both qualify.
fn ensure_non_empty_file(path: &Path, what: &str) -> anyhow::Result<()> {
    let the_metadata = std::fs::metadata(path).context(format!(
        "💀 {} '{}' not found. If it's a relative path, check the working directory, \
         or use an absolute path to be absolutely certain.",
        what,
        path.display()
    ))?;
    if !the_metadata.is_file() {
        bail!("💀 {} '{}' is not a regular file", what, path.display());
    }
    if the_metadata.len() == 0 {
        bail!("💀 {} '{}' is empty", what, path.display());
    }
    Ok(())
}

impl AppConfig {
    /// ✅ Catch the nonsense before any worker does.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.directories.is_empty() {
            bail!("💀 `directories` is empty. There is nothing to back up, which is restful but pointless.");
        }
        if self.runtime.batch_size == 0 {
            bail!("💀 `runtime.batch_size` must be at least 1");
        }
        if self.runtime.transfer_timeout_secs == 0 {
            bail!("💀 `runtime.transfer_timeout_secs` must be at least 1");
        }
        match &self.destination {
            DestinationConfig::S3(s3_config) => {
                if s3_config.bucket.trim().is_empty() {
                    bail!("💀 `destination.S3.bucket` is empty");
                }
                ensure_non_empty_file(&s3_config.credentials_file, "Credential file")?;
            }
            DestinationConfig::Filesystem(fs_config) => {
                if fs_config.root.as_os_str().is_empty() {
                    bail!("💀 `destination.Filesystem.root` is empty");
                }
            }
            DestinationConfig::InMemory => {}
        }
        Ok(())
    }
}

/// 🚀 Load and validate the config from `config_file` plus `STOW_*` env vars.
///
/// 💀 Fails if the file is missing or empty, if it doesn't parse, or if
/// validation rejects it.
pub fn load_config(config_file: &Path) -> anyhow::Result<AppConfig> {
    info!("🔧 Loading configuration: {}", config_file.display());

    ensure_non_empty_file(config_file, "Configuration file")?;

    let the_config: AppConfig = Figment::new()
        .merge(Env::prefixed("STOW_").split("__"))
        .merge(Toml::file(config_file))
        .extract()
        .context(format!(
            "💀 Failed to parse configuration from '{}' and environment variables (STOW_*)",
            config_file.display()
        ))?;

    the_config.validate().context(format!(
        "💀 Configuration in '{}' is not usable",
        config_file.display()
    ))?;
    Ok(the_config)
}
