mod file_config;

pub use file_config::{FileConfig, JournalConfig, QueryConfig};

use crate::journal::{LineStyle, RenderOptions};
use crate::manager::ContactManagerConfig;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    /// Directive for `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LoggingLevel::Error => "error",
            LoggingLevel::Warn => "warn",
            LoggingLevel::Info => "info",
            LoggingLevel::Debug => "debug",
            LoggingLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Markup {
    #[default]
    Plain,
    Markdown,
}

impl From<Markup> for LineStyle {
    fn from(markup: Markup) -> Self {
        match markup {
            Markup::Plain => LineStyle::Plain,
            Markup::Markdown => LineStyle::Markdown,
        }
    }
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub logging_level: LoggingLevel,
    pub markup: Markup,
    pub per_page: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            logging_level: LoggingLevel::default(),
            markup: Markup::default(),
            per_page: 25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub logging_level: LoggingLevel,
    pub journal: JournalSettings,
    pub query: QuerySettings,
}

#[derive(Debug, Clone)]
pub struct JournalSettings {
    pub reverse_order_default: bool,
    pub markup: Markup,
    pub only_path: bool,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub per_page: usize,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;
        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let logging_level = file
            .logging_level
            .and_then(|s| LoggingLevel::from_str(&s, true).ok())
            .unwrap_or(cli.logging_level);

        let journal_file = file.journal.unwrap_or_default();
        let markup = match journal_file.markup {
            Some(s) => match Markup::from_str(&s, true) {
                Ok(markup) => markup,
                Err(_) => bail!("Unknown journal markup: {}", s),
            },
            None => cli.markup,
        };
        let journal = JournalSettings {
            reverse_order_default: journal_file.reverse_order_default.unwrap_or(false),
            markup,
            only_path: journal_file.only_path.unwrap_or(true),
            base_url: journal_file.base_url.unwrap_or_default(),
        };

        let per_page = file
            .query
            .and_then(|q| q.per_page)
            .unwrap_or(cli.per_page);
        if per_page == 0 {
            bail!("query.per_page must be greater than 0");
        }

        Ok(Self {
            db_path,
            logging_level,
            journal,
            query: QuerySettings { per_page },
        })
    }

    pub fn manager_config(&self) -> ContactManagerConfig {
        ContactManagerConfig {
            reverse_order_default: self.journal.reverse_order_default,
            render: RenderOptions {
                only_path: self.journal.only_path,
                base_url: self.journal.base_url.clone(),
            },
        }
    }
}
