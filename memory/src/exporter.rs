//! # Exporter
//!
//! Writes query results to JSON or CSV files.
//!
//! | Format | Layout |
//! |--------|--------|
//! | `json` | Pretty-printed array of records |
//! | `csv` | One row per record; header is the sorted field names of the first record. Nested values are written as compact JSON. |

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use memory_core::{MemoryError, Result};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportType {
    #[default]
    Json,
    Csv,
}

impl ExportType {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportType::Json => "json",
            ExportType::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportType::Json),
            "csv" => Ok(ExportType::Csv),
            other => Err(MemoryError::validation(format!(
                "Unsupported export format: {}",
                other
            ))),
        }
    }
}

/// Serializes records to files.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryExporter;

impl MemoryExporter {
    pub fn new() -> Self {
        Self
    }

    /// Writes `data` to `file_path`, creating parent directories.
    pub async fn export_data<T: Serialize>(
        &self,
        data: &[T],
        file_path: &Path,
        export_type: ExportType,
    ) -> Result<()> {
        let bytes = match export_type {
            ExportType::Json => serde_json::to_vec_pretty(data)?,
            ExportType::Csv => to_csv(data)?,
        };

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(file_path, &bytes).await?;

        info!(
            path = %file_path.display(),
            format = %export_type,
            count = data.len(),
            "Exported records"
        );
        Ok(())
    }
}

fn to_csv<T: Serialize>(data: &[T]) -> Result<Vec<u8>> {
    let records = data
        .iter()
        .map(|record| match serde_json::to_value(record)? {
            JsonValue::Object(map) => Ok(map),
            other => Err(MemoryError::Serialization(format!(
                "CSV export requires object records, got {}",
                other
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    if let Some(first) = records.first() {
        let mut headers: Vec<&String> = first.keys().collect();
        headers.sort();
        writer.write_record(headers.iter().map(|h| h.as_str())).map_err(csv_error)?;

        for record in &records {
            let row: Vec<String> = headers
                .iter()
                .map(|h| record.get(h.as_str()).map(csv_cell).unwrap_or_default())
                .collect();
            writer.write_record(&row).map_err(csv_error)?;
        }
    }
    writer
        .into_inner()
        .map_err(|e| MemoryError::Serialization(e.to_string()))
}

fn csv_cell(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_error(e: csv::Error) -> MemoryError {
    MemoryError::Serialization(e.to_string())
}
