//! JSON-lines audit store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{AuditRecord, AuditStore};

struct Writer {
    file: File,
    next_id: u64,
    /// File length up to the last complete record
    committed: u64,
}

/// Appends one `serde_json` record per line. Ids continue from the number of
/// lines already in the file.
///
/// A record is either fully written or not at all: a failed write is cut back
/// to the last complete line, and a torn line left by a crash is dropped on
/// open.
pub struct JsonlAuditStore {
    path: PathBuf,
    writer: Mutex<Writer>,
}

impl JsonlAuditStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let (existing, committed, total) = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let committed = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
                let lines = bytes[..committed]
                    .split(|b| *b == b'\n')
                    .filter(|line| !line.iter().all(|b| b.is_ascii_whitespace()))
                    .count();
                (lines as u64, committed as u64, bytes.len() as u64)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (0, 0, 0),
            Err(e) => {
                return Err(e).with_context(|| format!("reading audit log {}", path.display()))
            }
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("opening audit log {}", path.display()))?;

        if committed < total {
            warn!(
                path = %path.display(),
                dropped_bytes = total - committed,
                "Dropping incomplete trailing audit record"
            );
            file.set_len(committed)
                .await
                .with_context(|| format!("truncating audit log {}", path.display()))?;
        }

        debug!(path = %path.display(), existing, "Audit store opened");

        Ok(Self {
            path,
            writer: Mutex::new(Writer {
                file,
                next_id: existing + 1,
                committed,
            }),
        })
    }
}

#[async_trait]
impl AuditStore for JsonlAuditStore {
    async fn append(&self, record: AuditRecord) -> Result<u64> {
        let mut line = serde_json::to_string(&record).context("serializing audit record")?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        let written = match writer.file.write_all(line.as_bytes()).await {
            Ok(()) => writer.file.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            let committed = writer.committed;
            if let Err(truncate) = writer.file.set_len(committed).await {
                warn!(
                    path = %self.path.display(),
                    error = %truncate,
                    "Could not cut back partial audit record"
                );
            }
            return Err(e).with_context(|| format!("writing audit log {}", self.path.display()));
        }

        writer.committed += line.len() as u64;
        let id = writer.next_id;
        writer.next_id += 1;
        Ok(id)
    }
}
