use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::catalog::ImportOptions;
use crate::database::db_loader::get_default_root_dir;
use crate::errors::MdbError;
use crate::extractor::DEFAULT_USER_AGENT;
use crate::pipeline::PipelineOptions;

pub const CONFIG_FILE_NAME: &str = "config.toml";

// ========== Database Configuration ==========

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database file, defaults to ~/.mangadb/manga_db.sqlite
    pub path: Option<String>,

    /// Open without write access; every write fails
    #[serde(default)]
    pub read_only: bool,
}

// ========== Import Configuration ==========

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportConfig {
    /// Pages fetched at the same time during batch imports
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Fetched pages waiting for the writer
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Lists every imported book is put on
    #[serde(default)]
    pub default_lists: Vec<String>,
}

fn default_workers() -> usize {
    4
}

fn default_queue_size() -> usize {
    16
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_size: default_queue_size(),
            user_agent: default_user_agent(),
            default_lists: vec![],
        }
    }
}

impl ImportConfig {
    pub fn pipeline_options(&self, extra_lists: &[String], downloaded: bool) -> PipelineOptions {
        let mut lists = self.default_lists.clone();
        lists.extend(extra_lists.iter().cloned());
        PipelineOptions {
            workers: self.workers,
            queue_size: self.queue_size,
            import: ImportOptions { lists, downloaded },
        }
    }
}

// ========== Search Configuration ==========

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_page_size")]
    pub page_size: i64,

    /// e.g. "id DESC" or "title_eng ASC"
    #[serde(default = "default_order")]
    pub default_order: String,
}

fn default_page_size() -> i64 {
    60
}

fn default_order() -> String {
    "id DESC".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            default_order: default_order(),
        }
    }
}

// ========== Logging Configuration ==========

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is not set
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

// ========== Root Configuration ==========

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from ~/.mangadb/config.toml
    pub fn load() -> Result<Self, MdbError> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Missing file means defaults
    pub fn load_from(config_path: &Path) -> Result<Self, MdbError> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| MdbError::Generic(format!("Failed to read config: {}", e)))?;

        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, MdbError> {
        toml::from_str(contents).map_err(|e| MdbError::Parse(format!("Failed to parse config: {}", e)))
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf, MdbError> {
        Ok(PathBuf::from(get_default_root_dir()?).join(CONFIG_FILE_NAME))
    }

    /// Create a sample configuration file
    pub fn create_sample() -> Result<PathBuf, MdbError> {
        let config_path = Self::get_config_path()?;
        Self::write_sample(&config_path)?;
        Ok(config_path)
    }

    pub fn write_sample(config_path: &Path) -> Result<(), MdbError> {
        if config_path.exists() {
            return Err(MdbError::Generic(format!(
                "Config file already exists at {}",
                config_path.display()
            )));
        }

        let sample = r#"# mangadb Configuration File

[database]
# Database file (default: ~/.mangadb/manga_db.sqlite)
# path = "/home/user/manga/manga_db.sqlite"

# Refuse every write, useful for browsing a shared database
read_only = false

[import]
# Pages fetched in parallel during batch imports
workers = 4

# Fetched pages buffered for the database writer
queue_size = 16

user_agent = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0"

# Lists every imported book is added to
default_lists = []

[search]
page_size = 60

# Column followed by ASC or DESC: id, title_eng, title_foreign, pages,
# rating, my_rating, last_change, last_update
default_order = "id DESC"

[logging]
# Overridden by RUST_LOG, e.g. "mangadb=debug"
level = "info"
"#;

        std::fs::write(config_path, sample)
            .map_err(|e| MdbError::Generic(format!("Failed to write sample config: {}", e)))?;

        info!("Sample config created at: {}", config_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg = Config::parse(
            r#"
            [database]
            read_only = true

            [import]
            workers = 8
            default_lists = ["to-read"]
            "#,
        )
        .unwrap();
        assert!(cfg.database.read_only);
        assert!(cfg.database.path.is_none());
        assert_eq!(cfg.import.workers, 8);
        assert_eq!(cfg.import.queue_size, 16);
        assert_eq!(cfg.search.default_order, "id DESC");
        assert_eq!(cfg.logging.level, "info");

        let opts = cfg.import.pipeline_options(&["favs".to_string()], true);
        assert_eq!(opts.import.lists, vec!["to-read", "favs"]);
        assert!(opts.import.downloaded);
    }

    #[test]
    fn test_bad_config_is_a_parse_error() {
        assert!(matches!(
            Config::parse("[import]\nworkers = \"many\""),
            Err(MdbError::Parse(_))
        ));
    }

    #[test]
    fn test_sample_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        Config::write_sample(&path).unwrap();
        assert!(Config::write_sample(&path).is_err());

        let cfg = Config::load_from(&path).unwrap();
        assert!(!cfg.database.read_only);
        assert_eq!(cfg.search.page_size, 60);
        assert!(cfg.import.default_lists.is_empty());
        assert_eq!(cfg.import.user_agent, DEFAULT_USER_AGENT);

        let missing = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(missing.import.workers, 4);
    }
}
