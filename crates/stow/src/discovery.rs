//! 🚶 Discovery: walk every configured root and write down every file we meet.
//!
//! A root that doesn't exist gets a warning and a shrug. Anything else that
//! goes wrong mid-walk (permissions, a directory vanishing under us) is
//! fatal. A backup that quietly skipped half a tree is worse than no backup.
//!
//! Entries come out in file-name order within each directory, so the same
//! tree always yields the same manifest, and the same partition.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::common::Manifest;
use crate::progress::missing_dir_line;

/// 📜 Build the manifest from `roots`. Directories are walked, never listed.
pub fn discover(roots: &[PathBuf]) -> Result<Manifest> {
    let mut the_paths = Vec::new();

    for root in roots {
        let the_root_exists = root
            .try_exists()
            .context(format!("💀 Couldn't check whether '{}' exists", root.display()))?;
        if !the_root_exists {
            warn!("⚠️ root '{}' not found, skipping", root.display());
            println!("{}", missing_dir_line(root));
            continue;
        }

        let the_count_before = the_paths.len();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.context(format!(
                "💀 Walking '{}' fell over. Fix the permissions or the tree, then try again.",
                root.display()
            ))?;
            if !entry.file_type().is_dir() {
                the_paths.push(entry.into_path());
            }
        }
        debug!(
            "🚶 '{}' contributed {} files",
            root.display(),
            the_paths.len() - the_count_before
        );
    }

    Ok(Manifest::new(the_paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn the_one_where_every_file_gets_found_and_no_directory_does() -> Result<()> {
        let the_scratch = tempfile::tempdir()?;
        let the_root = the_scratch.path().join("docs");
        fs::create_dir_all(the_root.join("deeply/nested"))?;
        fs::write(the_root.join("a.txt"), "a")?;
        fs::write(the_root.join("deeply/b.txt"), "b")?;
        fs::write(the_root.join("deeply/nested/c.txt"), "c")?;

        let the_manifest = discover(&[the_root.clone()])?;
        assert_eq!(
            the_manifest.paths(),
            &[
                the_root.join("a.txt"),
                the_root.join("deeply/b.txt"),
                the_root.join("deeply/nested/c.txt"),
            ]
        );
        Ok(())
    }

    #[test]
    fn the_one_where_a_missing_root_is_skipped_not_fatal() -> Result<()> {
        let the_scratch = tempfile::tempdir()?;
        let the_real_root = the_scratch.path().join("real");
        fs::create_dir_all(&the_real_root)?;
        fs::write(the_real_root.join("x.bin"), [0u8; 4])?;

        let the_manifest = discover(&[
            the_scratch.path().join("imaginary"),
            the_real_root.clone(),
        ])?;
        assert_eq!(the_manifest.len(), 1);
        assert_eq!(the_manifest.paths()[0], the_real_root.join("x.bin"));
        Ok(())
    }

    #[test]
    fn the_one_where_roots_keep_their_configured_order() -> Result<()> {
        let the_scratch = tempfile::tempdir()?;
        let the_zebra = the_scratch.path().join("zebra");
        let the_aardvark = the_scratch.path().join("aardvark");
        fs::create_dir_all(&the_zebra)?;
        fs::create_dir_all(&the_aardvark)?;
        fs::write(the_zebra.join("z"), "z")?;
        fs::write(the_aardvark.join("a"), "a")?;

        let the_manifest = discover(&[the_zebra.clone(), the_aardvark.clone()])?;
        assert_eq!(the_manifest.paths(), &[the_zebra.join("z"), the_aardvark.join("a")]);
        Ok(())
    }

    #[test]
    fn the_one_where_a_single_file_root_is_its_own_manifest() -> Result<()> {
        let the_scratch = tempfile::tempdir()?;
        let the_file = the_scratch.path().join("lonely.txt");
        fs::write(&the_file, "just me")?;

        let the_manifest = discover(&[the_file.clone()])?;
        assert_eq!(the_manifest.paths(), &[the_file]);
        Ok(())
    }
}
