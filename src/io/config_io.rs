use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::AppConfig;

/// Config file looked up in the working directory when none is named
pub const DEFAULT_CONFIG_FILE: &str = "tasktree.toml";
/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "TASKTREE_CONFIG";

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Parse a config file. Missing keys take their defaults.
pub fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Resolve the config: an explicit path, then `$TASKTREE_CONFIG`, then
/// `tasktree.toml` in `cwd` if present, otherwise defaults.
///
/// A file named explicitly or through the environment must exist.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<AppConfig, ConfigError> {
    let env_path = std::env::var_os(CONFIG_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    resolve_config(explicit, env_path.as_deref(), cwd)
}

fn resolve_config(
    explicit: Option<&Path>,
    env_path: Option<&Path>,
    cwd: &Path,
) -> Result<AppConfig, ConfigError> {
    if let Some(path) = explicit.or(env_path) {
        return read_config(path);
    }
    let implicit = cwd.join(DEFAULT_CONFIG_FILE);
    if implicit.is_file() {
        return read_config(&implicit);
    }
    Ok(AppConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_any_file() {
        let tmp = TempDir::new().unwrap();
        let config = resolve_config(None, None, tmp.path()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.storage.file, PathBuf::from("tasks.json"));
        assert!(config.storage.autosave);
        assert_eq!(config.storage.root_name, "Main");
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_implicit_file_partial_keys() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(DEFAULT_CONFIG_FILE),
            "[storage]\nfile = \"todo.csv\"\nautosave = false\n",
        )
        .unwrap();
        let config = resolve_config(None, None, tmp.path()).unwrap();
        assert_eq!(config.storage.file, PathBuf::from("todo.csv"));
        assert!(!config.storage.autosave);
        assert_eq!(config.storage.root_name, "Main");
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_explicit_wins_over_env_and_implicit() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(DEFAULT_CONFIG_FILE), "[log]\nlevel = \"info\"\n").unwrap();
        let env = tmp.path().join("env.toml");
        fs::write(&env, "[log]\nlevel = \"debug\"\n").unwrap();
        let explicit = tmp.path().join("explicit.toml");
        fs::write(&explicit, "[log]\nlevel = \"trace\"\n").unwrap();

        let config = resolve_config(Some(&explicit), Some(&env), tmp.path()).unwrap();
        assert_eq!(config.log.level, "trace");
        let config = resolve_config(None, Some(&env), tmp.path()).unwrap();
        assert_eq!(config.log.level, "debug");
        let config = resolve_config(None, None, tmp.path()).unwrap();
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_explicit_missing_or_malformed_is_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing.toml");
        assert!(matches!(
            resolve_config(Some(&missing), None, tmp.path()),
            Err(ConfigError::ReadError { .. })
        ));

        let bad = tmp.path().join("bad.toml");
        fs::write(&bad, "[storage\nfile = 3").unwrap();
        assert!(matches!(
            resolve_config(Some(&bad), None, tmp.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
