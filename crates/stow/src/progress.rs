//! 📊 progress.rs: "Are we there yet?" asked once per file, forever.
//!
//! Two jobs live here:
//! 1. The per-file console lines (`[OK]`, `[WARNING]`, `[ERROR]`) that go to stdout.
//! 2. An indicatif bar counting files, drawn on stderr, tucked out of the way
//!    whenever a console line needs printing so the two never trample each other.
//!
//! ⚠️ Watching the bar will not make it go faster. We checked.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

// -- 📏 one mebibyte. not a megabyte. there's a difference and I will die on this hill.
const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// 📦 Bytes, scaled to whatever unit keeps the number readable.
pub(crate) fn format_bytes(bytes: u64) -> String {
    if bytes >= GIB {
        format!("{:.2} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= 1024 {
        format!("{:.2} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{} bytes", bytes)
    }
}

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS.mmm, or HH:MM:SS.mmm when the backup turned into a lifestyle.
pub(crate) fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = duration.subsec_millis();
    if hours > 0 {
        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    } else {
        format!("{:02}:{:02}.{:03}", minutes, seconds, millis)
    }
}

// ============================================================
//  🖨️ Console lines
// ============================================================

pub(crate) fn ok_line(key: &str) -> String {
    format!("[OK] File \"{}\" copied successfully", key)
}

pub(crate) fn missing_file_line(path: &Path) -> String {
    format!("[WARNING] File \"{}\" not found", path.display())
}

pub(crate) fn failed_file_line(path: &Path, reason: &str) -> String {
    format!("[ERROR] File \"{}\": {}", path.display(), reason)
}

pub(crate) fn missing_dir_line(path: &Path) -> String {
    format!("[WARNING] Dir \"{}\" not found", path.display())
}

// ============================================================
//  📊 UploadProgress
// ============================================================

/// 📊 Shared progress handle. Clone it into every worker; it's all `Arc`s inside.
#[derive(Clone)]
pub(crate) struct UploadProgress {
    bar: ProgressBar,
    bytes_uploaded: Arc<AtomicU64>,
}

impl std::fmt::Debug for UploadProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("UploadProgress")
            .field("position", &self.bar.position())
            .field("length", &self.bar.length())
            .field("bytes_uploaded", &self.bytes_uploaded.load(Ordering::Relaxed))
            .finish()
    }
}

impl UploadProgress {
    /// 🚀 A bar for `total_files` files. `visible = false` gives a bar that never draws.
    pub(crate) fn new(total_files: u64, visible: bool) -> Self {
        if !visible {
            return Self::hidden();
        }
        let bar = ProgressBar::new(total_files);
        // -- 🐛 the template is a literal; if it ever fails to parse we just keep the default style
        if let Ok(the_style) = ProgressStyle::default_bar()
            .template("{spinner} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
        {
            bar.set_style(the_style.progress_chars("=>-"));
        }
        Self {
            bar,
            bytes_uploaded: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            bytes_uploaded: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 🖨️ Print a console line to stdout without shredding the bar.
    pub(crate) fn println(&self, line: &str) {
        self.bar.suspend(|| println!("{}", line));
    }

    /// ✅ One more file dealt with, whatever its fate.
    pub(crate) fn file_done(&self, bytes: u64) {
        let the_total = self.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.bar.set_message(format_bytes(the_total));
        self.bar.inc(1);
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
