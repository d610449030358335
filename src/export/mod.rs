//! CSV export of extracted product records.
//!
//! Batch modes overwrite one file per category; single-product mode appends to
//! a per-title file and writes the header only when that file is new.

use crate::models::{ExportBatch, ProductRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// `ddmmYYYY_HHMMSS`, one file per label per second.
const TIMESTAMP_FORMAT: &str = "%d%m%Y_%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPolicy {
    /// Truncate and write header + rows.
    Overwrite,
    /// Add rows; header only on first write.
    Append,
}

/// Replace anything outside `[A-Za-z0-9_.-]` (Unicode letters/digits allowed) with `_`.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{dir}/{sanitized label}_{timestamp}.csv`
    pub fn file_path(&self, label: &str, at: DateTime<Local>) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.csv",
            sanitize_label(label),
            at.format(TIMESTAMP_FORMAT)
        ))
    }

    /// Write a category batch to a fresh file. Returns `None` (and writes
    /// nothing) for an empty batch.
    pub fn export_batch(&self, batch: &ExportBatch) -> Result<Option<PathBuf>> {
        self.export_batch_at(batch, Local::now())
    }

    pub fn export_batch_at(&self, batch: &ExportBatch, at: DateTime<Local>) -> Result<Option<PathBuf>> {
        if batch.is_empty() {
            info!("No data to export for {:?}", batch.label());
            return Ok(None);
        }

        let path = self.file_path(batch.label(), at);
        self.write(&path, batch.records(), ExportPolicy::Overwrite)?;

        info!("Exported {} records to {:?}", batch.len(), path);
        Ok(Some(path))
    }

    /// Append one record to the file named after `label`.
    pub fn append_record(&self, record: &ProductRecord, label: &str) -> Result<PathBuf> {
        self.append_record_at(record, label, Local::now())
    }

    pub fn append_record_at(
        &self,
        record: &ProductRecord,
        label: &str,
        at: DateTime<Local>,
    ) -> Result<PathBuf> {
        let path = self.file_path(label, at);
        self.write(&path, std::slice::from_ref(record), ExportPolicy::Append)?;

        info!("Appended record to {:?}", path);
        Ok(path)
    }

    fn write(&self, path: &Path, records: &[ProductRecord], policy: ExportPolicy) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Could not create export dir {:?}", self.dir))?;

        let existed = path.exists();
        let mut options = OpenOptions::new();
        match policy {
            ExportPolicy::Overwrite => options.write(true).create(true).truncate(true),
            ExportPolicy::Append => options.append(true).create(true),
        };
        let file = options
            .open(path)
            .with_context(|| format!("Could not open {:?}", path))?;

        let write_header = policy == ExportPolicy::Overwrite || !existed;
        debug!("Writing {} rows to {:?} (header: {})", records.len(), path, write_header);

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);

        for record in records {
            writer
                .serialize(record.to_row())
                .with_context(|| format!("Failed to write {} to {:?}", record.product_page_url, path))?;
        }

        writer.flush().with_context(|| format!("Failed to flush {:?}", path))?;
        Ok(())
    }
}
