// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Transfer sender: source expansion, excludes, and chunked emission.

use crate::fs::WorkFs;
use crate::glob::is_glob;
use crate::TransferError;
use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher};
use knita_wire::{FileBody, FileHeader, FileTrailer, FileTransfer, CHUNK_SIZE};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Destination for emitted frames; implemented over RPC connections and
/// by in-memory sinks in tests.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: FileTransfer) -> Result<(), TransferError>;
}

/// Invoked after each file or directory is fully emitted.
pub type SendCallback = Box<dyn Fn(&FileHeader) + Send + Sync>;

/// Invoked with (path, is_dir, excluded_by) for each skipped entry.
pub type SkipCallback = Box<dyn Fn(&str, bool, &str) + Send + Sync>;

#[derive(Default)]
pub struct SendOptions {
    /// Destination prefix; empty means "mirror the source path".
    pub dest: String,
    /// Literal paths (prefix-matched) or glob patterns to skip.
    pub excludes: Vec<String>,
    pub on_send: Option<SendCallback>,
    pub on_skip: Option<SkipCallback>,
}

enum Exclude {
    Literal(String),
    Glob {
        pattern: String,
        matcher: GlobMatcher,
        /// For `p/**` patterns, matches `p` itself so an excluded
        /// directory is pruned wholesale rather than emptied.
        stem: Option<GlobMatcher>,
    },
}

impl Exclude {
    fn matches(&self, path: &str) -> bool {
        match self {
            Exclude::Literal(prefix) => {
                path == prefix || path.starts_with(&format!("{prefix}/"))
            }
            Exclude::Glob { matcher, stem, .. } => {
                matcher.is_match(path) || stem.as_ref().is_some_and(|s| s.is_match(path))
            }
        }
    }

    fn pattern(&self) -> &str {
        match self {
            Exclude::Literal(p) => p,
            Exclude::Glob { pattern, .. } => pattern,
        }
    }
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher, TransferError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| TransferError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// Emits one transfer (any number of files and directories) into a
/// [`FrameSink`].
pub struct Sender<'s, S: FrameSink> {
    fs: WorkFs,
    sink: &'s mut S,
    runtime_id: String,
    transfer_id: String,
    dest: String,
    excludes: Vec<Exclude>,
    on_send: Option<SendCallback>,
    on_skip: Option<SkipCallback>,
}

impl<'s, S: FrameSink> Sender<'s, S> {
    pub fn new(
        fs: WorkFs,
        sink: &'s mut S,
        runtime_id: impl Into<String>,
        transfer_id: impl Into<String>,
        opts: SendOptions,
    ) -> Result<Self, TransferError> {
        let mut excludes = Vec::with_capacity(opts.excludes.len());
        for pattern in &opts.excludes {
            if is_glob(pattern)? {
                let stem = match pattern.strip_suffix("/**") {
                    Some(stem) => Some(compile_glob(stem)?),
                    None => None,
                };
                excludes.push(Exclude::Glob {
                    pattern: pattern.clone(),
                    matcher: compile_glob(pattern)?,
                    stem,
                });
            } else {
                excludes.push(Exclude::Literal(pattern.clone()));
            }
        }
        Ok(Self {
            fs,
            sink,
            runtime_id: runtime_id.into(),
            transfer_id: transfer_id.into(),
            dest: opts.dest,
            excludes,
            on_send: opts.on_send,
            on_skip: opts.on_skip,
        })
    }

    /// Expands `src` and emits every (src, dest) pair that survives the
    /// exclude list.
    pub async fn send(&mut self, src: &str) -> Result<(), TransferError> {
        if Path::new(src).is_absolute() {
            return Err(TransferError::AbsoluteSrc(src.to_string()));
        }
        if Path::new(&self.dest).is_absolute() {
            return Err(TransferError::AbsoluteDest(self.dest.clone()));
        }
        let dest = self.dest.clone();

        if is_glob(src)? {
            return self.send_glob(src, &dest).await;
        }

        let trimmed = {
            let t = src.trim_end_matches('/');
            if t.is_empty() { "." } else { t }
        };
        let meta = match self.fs.metadata(trimmed).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransferError::SrcNotFound(src.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        // Directory contents: `dir/` or `.` copies children under dest.
        if src.ends_with('/') || src == "." {
            let root = trimmed.to_string();
            return self
                .walk(trimmed, true, |path| {
                    if path == root {
                        return None;
                    }
                    let final_dest = if dest.is_empty() {
                        path.to_string()
                    } else {
                        join_rel(&dest, trim_prefix(path, &root))
                    };
                    if final_dest == "." {
                        None
                    } else {
                        Some(final_dest)
                    }
                })
                .await;
        }

        // Literal directory: recursive copy; `dest/` nests under
        // dest/base(src), plain dest strips the src prefix.
        if meta.is_dir() {
            let src_owned = src.to_string();
            let src_parent = parent_of(src);
            return self
                .walk(src, false, |path| {
                    let final_dest = if dest.is_empty() {
                        path.to_string()
                    } else if dest.ends_with('/') {
                        join_rel(&dest, trim_prefix(path, &src_parent))
                    } else {
                        join_rel(&dest, trim_prefix(path, &src_owned))
                    };
                    Some(final_dest)
                })
                .await;
        }

        // Literal file.
        let final_dest = if dest.is_empty() {
            src.to_string()
        } else if dest.ends_with('/') {
            join_rel(&dest, base_name(src))
        } else {
            dest.clone()
        };
        self.filtered_send(false, src, &final_dest).await?;
        Ok(())
    }

    /// Walks every glob match as a directory (or single file).
    async fn send_glob(&mut self, pattern: &str, dest: &str) -> Result<(), TransferError> {
        let matcher = compile_glob(pattern)?;
        let stem = match pattern.strip_suffix("/**") {
            Some(stem) => Some(compile_glob(stem)?),
            None => None,
        };
        let mut matches = Vec::new();
        for (path, _) in self.collect_tree(".").await? {
            if matcher.is_match(&path) || stem.as_ref().is_some_and(|s| s.is_match(&path)) {
                matches.push(path);
            }
        }
        if matches.is_empty() {
            return Err(TransferError::NoMatches(pattern.to_string()));
        }
        for matched in matches {
            let match_dir = parent_of(&matched);
            let dest = dest.to_string();
            self.walk(&matched, false, |path| {
                let final_dest = if dest.is_empty() {
                    path.to_string()
                } else if match_dir == "." {
                    join_rel(&dest, path)
                } else {
                    join_rel(&dest, trim_prefix(path, &match_dir))
                };
                if final_dest == "." {
                    None
                } else {
                    Some(final_dest)
                }
            })
            .await?;
        }
        Ok(())
    }

    /// Pre-order walk from `root`, emitting each entry through
    /// `dest_for`. `None` from `dest_for` descends without emitting.
    /// Excluded directories are pruned wholesale.
    async fn walk(
        &mut self,
        root: &str,
        skip_root: bool,
        mut dest_for: impl FnMut(&str) -> Option<String> + Send,
    ) -> Result<(), TransferError> {
        let root_meta = self.fs.metadata(root).await?;
        let mut stack = vec![(root.to_string(), root_meta.is_dir())];
        while let Some((path, is_dir)) = stack.pop() {
            let at_root = path == root;
            if !(skip_root && at_root) {
                if let Some(final_dest) = dest_for(&path) {
                    let sent = self.filtered_send(is_dir, &path, &final_dest).await?;
                    if !sent && is_dir {
                        continue;
                    }
                }
            }
            if is_dir {
                let children = self.fs.read_dir_sorted(&path).await?;
                for name in children.iter().rev() {
                    let child = join_rel(&path, name);
                    let meta = self.fs.metadata(&child).await?;
                    stack.push((child, meta.is_dir()));
                }
            }
        }
        Ok(())
    }

    /// Pre-order list of every path under `root`, including `root`.
    async fn collect_tree(&self, root: &str) -> Result<Vec<(String, bool)>, TransferError> {
        let root_meta = self.fs.metadata(root).await?;
        let mut out = Vec::new();
        let mut stack = vec![(root.to_string(), root_meta.is_dir())];
        while let Some((path, is_dir)) = stack.pop() {
            out.push((path.clone(), is_dir));
            if is_dir {
                let children = self.fs.read_dir_sorted(&path).await?;
                for name in children.iter().rev() {
                    let child = join_rel(&path, name);
                    let meta = self.fs.metadata(&child).await?;
                    stack.push((child, meta.is_dir()));
                }
            }
        }
        Ok(out)
    }

    /// Sends one entry unless excluded. Returns false when skipped.
    async fn filtered_send(
        &mut self,
        is_dir: bool,
        src: &str,
        dest: &str,
    ) -> Result<bool, TransferError> {
        if let Some(excluded_by) = self.excluded_by(src) {
            if let Some(cb) = &self.on_skip {
                cb(src, is_dir, &excluded_by);
            }
            if is_dir {
                tracing::info!(path = src, %excluded_by, "skipped directory");
            } else {
                tracing::info!(path = src, %excluded_by, "skipped file");
            }
            return Ok(false);
        }
        if is_dir {
            self.send_directory(src, dest).await?;
        } else {
            self.send_file(src, dest).await?;
        }
        Ok(true)
    }

    fn excluded_by(&self, path: &str) -> Option<String> {
        self.excludes
            .iter()
            .find(|e| e.matches(path))
            .map(|e| e.pattern().to_string())
    }

    async fn send_directory(&mut self, src: &str, dest: &str) -> Result<(), TransferError> {
        let meta = self.fs.metadata(src).await?;
        let header = FileHeader {
            is_dir: true,
            src_path: src.to_string(),
            dest_path: dest.to_string(),
            mode: mode_bits(&meta),
            size: 0,
        };
        self.sink
            .send_frame(FileTransfer {
                runtime_id: self.runtime_id.clone(),
                transfer_id: self.transfer_id.clone(),
                file_id: crate::new_file_id(),
                header: Some(header.clone()),
                body: None,
                trailer: Some(FileTrailer::default()),
            })
            .await?;
        tracing::debug!(src, dest, "sent directory");
        if let Some(cb) = &self.on_send {
            cb(&header);
        }
        Ok(())
    }

    async fn send_file(&mut self, src: &str, dest: &str) -> Result<(), TransferError> {
        let meta = self.fs.metadata(src).await?;
        let size = meta.len();
        let file_id = crate::new_file_id();
        let header = FileHeader {
            is_dir: false,
            src_path: src.to_string(),
            dest_path: dest.to_string(),
            mode: mode_bits(&meta),
            size,
        };
        if size == 0 {
            self.sink
                .send_frame(FileTransfer {
                    runtime_id: self.runtime_id.clone(),
                    transfer_id: self.transfer_id.clone(),
                    file_id,
                    header: Some(header.clone()),
                    body: None,
                    trailer: Some(FileTrailer::default()),
                })
                .await?;
        } else {
            let mut file = self.fs.open_read(src).await?;
            let mut offset = 0u64;
            while offset < size {
                let mut buf = vec![0u8; CHUNK_SIZE.min((size - offset) as usize)];
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    return Err(TransferError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("{src} truncated mid-send"),
                    )));
                }
                buf.truncate(n);
                let frame_offset = offset;
                offset += n as u64;
                self.sink
                    .send_frame(FileTransfer {
                        runtime_id: self.runtime_id.clone(),
                        transfer_id: self.transfer_id.clone(),
                        file_id: file_id.clone(),
                        header: (frame_offset == 0).then(|| header.clone()),
                        body: Some(FileBody { offset: frame_offset, data: buf }),
                        trailer: (offset == size).then(FileTrailer::default),
                    })
                    .await?;
                tracing::trace!(src, frame_offset, "sent file part");
            }
        }
        tracing::debug!(src, dest, size, "sent file");
        if let Some(cb) = &self.on_send {
            cb(&header);
        }
        Ok(())
    }
}

fn mode_bits(meta: &std::fs::Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o7777
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        0o644
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parent of a relative slash path; `.` for top-level entries.
fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) if idx > 0 => path[..idx].to_string(),
        _ => ".".to_string(),
    }
}

/// Plain string prefix trim, mirroring how dest paths are derived.
fn trim_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    path.strip_prefix(prefix).unwrap_or(path)
}

/// Joins two relative paths, dropping empty and `.` segments. Returns
/// `.` when nothing remains.
fn join_rel(a: &str, b: &str) -> String {
    let segments: Vec<&str> = a
        .split('/')
        .chain(b.split('/'))
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.is_empty() {
        ".".to_string()
    } else {
        segments.join("/")
    }
}

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;
