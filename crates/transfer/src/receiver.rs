// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Transfer receiver: a per-file state machine.

use crate::fs::WorkFs;
use crate::TransferError;
use knita_wire::FileHeader;
use knita_wire::FileTransfer;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Progress of one file through its frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveState {
    AwaitingHeader,
    AwaitingBody,
    AwaitingTrailer,
    Done,
}

/// Materialises one file or directory from its transfer frames.
///
/// A transfer holds one receiver per in-flight `file_id`; frames for
/// different files may interleave freely. On any error the in-progress
/// file is closed and deleted.
pub struct Receiver {
    fs: WorkFs,
    state: ReceiveState,
    file: Option<tokio::fs::File>,
    header: Option<FileHeader>,
}

impl Receiver {
    pub fn new(fs: WorkFs) -> Self {
        Self {
            fs,
            state: ReceiveState::AwaitingHeader,
            file: None,
            header: None,
        }
    }

    pub fn state(&self) -> ReceiveState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ReceiveState::Done
    }

    /// Consumes the next frame for this file.
    pub async fn next(&mut self, frame: &FileTransfer) -> Result<(), TransferError> {
        match self.advance(frame).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.abort().await;
                Err(e)
            }
        }
    }

    async fn advance(&mut self, frame: &FileTransfer) -> Result<(), TransferError> {
        // A frame may carry header, body, and trailer together; each
        // present section advances the state in turn. A section expected
        // at frame entry but absent is a protocol error (trailer) or a
        // deferral to the next frame (body).
        let entry = self.state;

        if self.state == ReceiveState::AwaitingHeader {
            let header = frame
                .header
                .as_ref()
                .ok_or_else(|| TransferError::HeaderExpected(frame.file_id.clone()))?;
            self.header = Some(header.clone());
            if header.is_dir {
                self.fs
                    .create_dir_all_mode(&header.dest_path, header.mode & 0o777)
                    .await?;
                self.state = ReceiveState::AwaitingTrailer;
            } else {
                let file = self.fs.open_write(&header.dest_path, header.mode & 0o777).await?;
                self.file = Some(file);
                self.state = ReceiveState::AwaitingBody;
            }
        }

        if self.state == ReceiveState::AwaitingBody {
            if let Some(body) = &frame.body {
                let file = self
                    .file
                    .as_mut()
                    .ok_or_else(|| TransferError::HeaderExpected(frame.file_id.clone()))?;
                file.seek(std::io::SeekFrom::Start(body.offset)).await?;
                file.write_all(&body.data).await?;
                if frame.trailer.is_some() {
                    self.state = ReceiveState::AwaitingTrailer;
                }
            } else if entry == ReceiveState::AwaitingBody {
                self.state = ReceiveState::AwaitingTrailer;
            }
        }

        if self.state == ReceiveState::AwaitingTrailer {
            match &frame.trailer {
                Some(trailer) => {
                    if trailer.md5.is_some() {
                        tracing::warn!("md5 set but verification not implemented");
                    }
                    self.state = ReceiveState::Done;
                }
                None if entry == ReceiveState::AwaitingTrailer => {
                    return Err(TransferError::TrailerExpected(frame.file_id.clone()));
                }
                None => {}
            }
        }

        if self.state == ReceiveState::Done {
            if let Some(mut file) = self.file.take() {
                file.flush().await?;
            }
            match &self.header {
                Some(h) if h.is_dir => {
                    tracing::debug!(path = %h.dest_path, "received directory")
                }
                Some(h) => {
                    tracing::debug!(path = %h.dest_path, size = h.size, "received file")
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Abandons the transfer mid-file, rolling back like an error.
    pub async fn cancel(&mut self) {
        if !self.is_done() {
            self.abort().await;
        }
    }

    /// Rolls back: closes and deletes the in-progress file.
    async fn abort(&mut self) {
        self.state = ReceiveState::Done;
        if let Some(file) = self.file.take() {
            drop(file);
            if let Some(header) = &self.header {
                if let Err(e) = self.fs.remove_file(&header.dest_path).await {
                    tracing::warn!(path = %header.dest_path, error = %e, "failed to roll back partial file");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "receiver_tests.rs"]
mod tests;
