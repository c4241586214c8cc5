//! Memory config: backend selection, results root, export format and logging. Loaded from env.

use std::env;
use std::str::FromStr;

use anyhow::Result;

use crate::exporter::ExportType;

/// Which backend `MemoryInterface::from_config` opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    Memory,
    Sqlite,
}

impl FromStr for StoreType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreType::Memory),
            "sqlite" => Ok(StoreType::Sqlite),
            other => anyhow::bail!("MEMORY_STORE_TYPE must be 'memory' or 'sqlite', got '{}'", other),
        }
    }
}

/// Memory configuration.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// MEMORY_STORE_TYPE
    pub store_type: String,
    /// MEMORY_SQLITE_PATH
    pub sqlite_path: String,
    /// RESULTS_PATH: root for exports and serialized media
    pub results_path: String,
    /// MEMORY_EXPORT_TYPE
    pub export_type: String,
    /// LOG_FILE
    pub log_file: Option<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            store_type: "memory".to_string(),
            sqlite_path: "./data/memory.db".to_string(),
            results_path: "./results".to_string(),
            export_type: "json".to_string(),
            log_file: None,
        }
    }
}

impl MemoryConfig {
    /// Load from environment variables, reading `.env` first if present.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let store_type = env::var("MEMORY_STORE_TYPE").unwrap_or(defaults.store_type);
        let sqlite_path = env::var("MEMORY_SQLITE_PATH").unwrap_or(defaults.sqlite_path);
        let results_path = env::var("RESULTS_PATH").unwrap_or(defaults.results_path);
        let export_type = env::var("MEMORY_EXPORT_TYPE").unwrap_or(defaults.export_type);
        let log_file = env::var("LOG_FILE").ok().filter(|s| !s.trim().is_empty());

        Ok(Self {
            store_type,
            sqlite_path,
            results_path,
            export_type,
            log_file,
        })
    }

    /// Validate config (store and export types must be known, paths non-empty).
    pub fn validate(&self) -> Result<()> {
        self.store_type()?;
        self.export_type()?;
        if self.store_type()? == StoreType::Sqlite && self.sqlite_path.trim().is_empty() {
            anyhow::bail!("MEMORY_STORE_TYPE=sqlite requires MEMORY_SQLITE_PATH to be set");
        }
        if self.results_path.trim().is_empty() {
            anyhow::bail!("RESULTS_PATH must not be empty");
        }
        Ok(())
    }

    pub fn store_type(&self) -> Result<StoreType> {
        self.store_type.parse()
    }

    pub fn export_type(&self) -> Result<ExportType> {
        self.export_type
            .parse::<ExportType>()
            .map_err(|e| anyhow::anyhow!("MEMORY_EXPORT_TYPE: {}", e))
    }
}
