use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{write_atomic, BackendKind, DaybookError, Result};

const CONFIG_FILE: &str = "config.json";

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Directory where all records are stored
    pub data_dir: PathBuf,

    /// Which backend stores entries, templates and contexts
    pub backend: BackendKind,

    /// Database file name inside `data_dir` (sqlite backend)
    pub database_file: String,

    /// Source recorded on contexts created implicitly by the binary
    pub context_source: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".daybook"));

        Config {
            data_dir,
            backend: BackendKind::File,
            database_file: "daybook.db".to_string(),
            context_source: "manual".to_string(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "daybook")
}

impl Config {
    /// Location of the configuration file when none is given explicitly.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Loads configuration from `path` (or the default location).
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => {
                debug!("No configuration location available, using defaults");
                return Ok(Self::default());
            }
        };

        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| DaybookError::ConfigError {
            message: format!("{}: {}", path.display(), e),
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Writes the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())?;
        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// Base directory of the day/block journal.
    pub fn journal_dir(&self) -> PathBuf {
        self.data_dir.join("journal")
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load(Some(&tmp.path().join("absent.json"))).unwrap();
        assert_eq!(config.backend, BackendKind::File);
        assert_eq!(config.database_file, "daybook.db");
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        let config = Config {
            data_dir: tmp.path().join("data"),
            backend: BackendKind::Sqlite,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap(), config);
        assert_eq!(config.database_path(), tmp.path().join("data/daybook.db"));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{ "backend": "sqlite" }"#).unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.context_source, "manual");
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(DaybookError::ConfigError { .. })
        ));
    }
}
