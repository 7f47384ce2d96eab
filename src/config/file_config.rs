use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub logging_level: Option<String>,

    pub journal: Option<JournalConfig>,
    pub query: Option<QueryConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct JournalConfig {
    /// History order for users without a stored preference.
    pub reverse_order_default: Option<bool>,
    /// "plain" or "markdown"
    pub markup: Option<String>,
    pub only_path: Option<bool>,
    /// Prefix of absolute links, used when `only_path` is false.
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub per_page: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
