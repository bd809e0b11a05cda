//! Local filesystem CSV sink.
//!
//! Output is UTF-8 with a byte-order mark so spreadsheet tools detect the
//! encoding. The file is written to a temp sibling and renamed into place,
//! so readers never observe a half-written export.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{ExportTable, TabularSink};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// CSV writer for the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct CsvSink;

impl CsvSink {
    pub fn new() -> Self {
        Self
    }

    /// Encode the table as BOM-prefixed CSV.
    pub fn encode(table: &ExportTable) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(UTF8_BOM.len() + table.len() * 64);
        buffer.extend_from_slice(UTF8_BOM);

        let mut writer = csv::Writer::from_writer(buffer);
        writer.write_record(table.labels().as_array())?;
        for row in table.rows() {
            writer.write_record([&row.published_at, &row.comment, &row.source_url])?;
        }
        writer
            .into_inner()
            .map_err(|e| AppError::Io(e.into_error()))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
        Self::ensure_dir(path).await?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl TabularSink for CsvSink {
    async fn write(&self, table: &ExportTable, path: &Path) -> Result<PathBuf> {
        let bytes = Self::encode(table).map_err(|e| AppError::export(path, e))?;
        Self::write_bytes(path, &bytes)
            .await
            .map_err(|e| AppError::export(path, e))?;

        let resolved = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| AppError::export(path, e))?;
        log::info!("Wrote {} rows to {}", table.len(), resolved.display());
        Ok(resolved)
    }
}
