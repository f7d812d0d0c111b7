//! Configuration for signalflow paths and history persistence.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SIGNALFLOW_HOME)
//! 2. Config file (.signalflow/config.yaml)
//! 3. Defaults (~/.signalflow)
//!
//! Config file discovery:
//! - Searches current directory and parents for .signalflow/config.yaml
//! - Paths in config file are relative to the .signalflow/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub history: Option<HistoryConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .signalflow/)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Write workflow histories to disk after each run
    pub persist: Option<bool>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to signalflow home (engine state)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// History settings
    pub history: HistorySettings,
}

#[derive(Debug, Clone)]
pub struct HistorySettings {
    pub persist: bool,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { persist: true }
    }
}

impl ResolvedConfig {
    /// Directory holding one subdirectory per persisted workflow
    pub fn histories_dir(&self) -> PathBuf {
        self.home.join("histories")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".signalflow").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".signalflow");

    let config_file = find_config_file();
    let env_home = std::env::var("SIGNALFLOW_HOME").ok().map(PathBuf::from);

    let (home, history) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        let home = if let Some(home) = env_home {
            home
        } else if let Some(ref home_path) = config.paths.home {
            let config_dir = config_path.parent().unwrap_or(Path::new("."));
            resolve_path(config_dir, home_path)
        } else {
            default_home
        };

        let history = HistorySettings {
            persist: config
                .history
                .as_ref()
                .and_then(|h| h.persist)
                .unwrap_or(true),
        };

        (home, history)
    } else {
        (env_home.unwrap_or(default_home), HistorySettings::default())
    };

    Ok(ResolvedConfig {
        home,
        config_file,
        history,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the signalflow home directory (engine state).
pub fn signalflow_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the histories directory ($SIGNALFLOW_HOME/histories)
pub fn histories_dir() -> Result<PathBuf> {
    Ok(config()?.histories_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(".signalflow");
        std::fs::create_dir_all(&config_dir).unwrap();

        let config_path = config_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  home: ./state
history:
  persist: false
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.paths.home, Some("./state".to_string()));
        assert_eq!(config.history.unwrap().persist, Some(false));
    }

    #[test]
    fn test_minimal_config_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.yaml");
        std::fs::write(&config_path, "version: \"1.0\"\n").unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert!(config.paths.home.is_none());
        assert!(config.history.is_none());
    }

    #[test]
    fn test_histories_dir() {
        let config = ResolvedConfig {
            home: PathBuf::from("/test/.signalflow"),
            config_file: None,
            history: HistorySettings::default(),
        };

        assert_eq!(
            config.histories_dir(),
            PathBuf::from("/test/.signalflow/histories")
        );
        assert!(config.history.persist);
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project/.signalflow");

        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        assert_eq!(
            resolve_path(&base, "./state"),
            PathBuf::from("/home/user/project/.signalflow/./state")
        );
    }
}
