// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! File transfer to workspace storage.
//!
//! Build artifacts reach the workspace through a single capability: put
//! bytes at a path. The REST client implements it on top of the streaming
//! DBFS endpoints, which take a file in base64 encoded blocks of at most
//! [`BLOCK_SIZE`] bytes each.

use crate::remote::{rest::RestClient, RemoteError};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{de::IgnoredAny, Deserialize};
use serde_json::json;
use std::path::Path;
use tracing::{info, instrument};

/// Largest block accepted by a single DBFS add-block call.
pub const BLOCK_SIZE: usize = 1024 * 1024;

/// Capability to put files into workspace storage.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Put bytes at remote path.
    async fn put(&self, path: &str, bytes: &[u8], overwrite: bool) -> Result<()>;
}

#[derive(Deserialize)]
struct StreamHandle {
    handle: i64,
}

#[async_trait]
impl FileTransfer for RestClient {
    #[instrument(skip(self, bytes), level = "debug")]
    async fn put(&self, path: &str, bytes: &[u8], overwrite: bool) -> Result<()> {
        let bar = transfer_bar(path, bytes.len())?;

        let stream: StreamHandle = self
            .post("dbfs/create", &json!({ "path": path, "overwrite": overwrite }))
            .await
            .map_err(|err| remote(err, path))?;

        for block in bytes.chunks(BLOCK_SIZE) {
            let body = json!({ "handle": stream.handle, "data": STANDARD.encode(block) });
            let _: IgnoredAny = self
                .post("dbfs/add-block", &body)
                .await
                .map_err(|err| remote(err, path))?;
            bar.inc(block.len() as u64);
        }

        let _: IgnoredAny = self
            .post("dbfs/close", &json!({ "handle": stream.handle }))
            .await
            .map_err(|err| remote(err, path))?;
        bar.finish();
        info!("uploaded {} bytes to {path}", bytes.len());

        Ok(())
    }
}

/// Upload local file through file transfer capability.
///
/// # Errors
///
/// - Return [`TransferError::Read`] if local file cannot be read.
/// - Return any error of [`FileTransfer::put`].
pub async fn upload_file(
    transfer: &dyn FileTransfer,
    local: &Path,
    remote: &str,
    overwrite: bool,
) -> Result<()> {
    let bytes = tokio::fs::read(local)
        .await
        .map_err(|err| TransferError::Read {
            source: err,
            path: local.display().to_string(),
        })?;
    transfer.put(remote, &bytes, overwrite).await
}

fn transfer_bar(path: &str, len: usize) -> Result<ProgressBar> {
    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}] {bytes}/{total_bytes}",
    )?
    .progress_chars("-Cco.");
    let bar = ProgressBar::new(len as u64);
    bar.set_style(style);
    bar.set_message(path.to_string());

    Ok(bar)
}

fn remote(source: RemoteError, path: &str) -> TransferError {
    TransferError::Remote {
        source,
        path: path.to_string(),
    }
}

/// File transfer error types.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Local file cannot be read.
    #[error("failed to read {path:?}")]
    Read {
        #[source]
        source: std::io::Error,
        path: String,
    },

    /// Remote storage call failed.
    #[error("failed to put {path:?}")]
    Remote {
        #[source]
        source: RemoteError,
        path: String,
    },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = TransferError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryTransfer {
        files: Mutex<Vec<(String, Vec<u8>, bool)>>,
    }

    #[async_trait]
    impl FileTransfer for MemoryTransfer {
        async fn put(&self, path: &str, bytes: &[u8], overwrite: bool) -> Result<()> {
            self.files
                .lock()
                .unwrap()
                .push((path.into(), bytes.to_vec(), overwrite));
            Ok(())
        }
    }

    #[tokio::test]
    async fn upload_file_puts_file_contents() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let local = dir.path().join("app.jar");
        std::fs::write(&local, b"PK\x03\x04")?;

        let transfer = MemoryTransfer::default();
        upload_file(&transfer, &local, "dbfs:/libs/app.jar", true).await?;

        let files = transfer.files.lock().unwrap().clone();
        assert_eq!(
            files,
            vec![("dbfs:/libs/app.jar".to_string(), b"PK\x03\x04".to_vec(), true)]
        );

        Ok(())
    }

    #[tokio::test]
    async fn upload_file_reports_missing_file() {
        let transfer = MemoryTransfer::default();
        let result =
            upload_file(&transfer, Path::new("/nonexistent/app.jar"), "dbfs:/x", false).await;
        assert!(matches!(result, Err(TransferError::Read { .. })));
    }
}
