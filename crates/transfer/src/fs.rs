// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Filesystem access rooted at a working directory.

use std::path::{Path, PathBuf};
use tokio::fs;

/// Read/write view over one directory tree.
///
/// All paths given to its methods are relative to the base; the base is
/// the runtime working directory on the executor side and the user's
/// working directory on the director side.
#[derive(Debug, Clone)]
pub struct WorkFs {
    base: PathBuf,
}

impl WorkFs {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn resolve(&self, rel: &str) -> PathBuf {
        if rel.is_empty() || rel == "." {
            self.base.clone()
        } else {
            self.base.join(rel)
        }
    }

    pub async fn metadata(&self, rel: &str) -> std::io::Result<std::fs::Metadata> {
        fs::metadata(self.resolve(rel)).await
    }

    /// Child names of a directory, sorted for deterministic walks.
    pub async fn read_dir_sorted(&self, rel: &str) -> std::io::Result<Vec<String>> {
        let mut entries = fs::read_dir(self.resolve(rel)).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    pub async fn open_read(&self, rel: &str) -> std::io::Result<fs::File> {
        fs::File::open(self.resolve(rel)).await
    }

    /// Creates a directory (and parents) applying `mode` to the leaf.
    pub async fn create_dir_all_mode(&self, rel: &str, mode: u32) -> std::io::Result<()> {
        let path = self.resolve(rel);
        fs::create_dir_all(&path).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).await?;
        }
        Ok(())
    }

    /// Opens `rel` for writing, truncating, creating parents as needed.
    pub async fn open_write(&self, rel: &str, mode: u32) -> std::io::Result<fs::File> {
        let path = self.resolve(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut options = fs::OpenOptions::new();
        options.create(true).truncate(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        options.open(&path).await
    }

    pub async fn remove_file(&self, rel: &str) -> std::io::Result<()> {
        fs::remove_file(self.resolve(rel)).await
    }
}
