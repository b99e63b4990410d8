//! Runtime configuration.
//!
//! Resolution order, later wins:
//! 1. built-in defaults
//! 2. a TOML file (`--config <path>`, or `kimrun.toml` in the current
//!    directory when present)
//! 3. `KIMRUN_*` environment variables

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Config file picked up from the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "kimrun.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KimConfig {
    /// Repository root holding the per-kind storage areas.
    pub repository: PathBuf,
    /// Root of the result tree.
    pub results: PathBuf,
    /// Parent of job and probe working directories.
    pub scratch: PathBuf,
    /// Build command, split on whitespace.
    pub build_command: String,
    /// Probe program for the live Test x Model check. `None` trusts
    /// declared metadata.
    pub probe_program: Option<PathBuf>,
    /// Per-run timeout in seconds, 0 = unbounded.
    pub timeout_secs: u64,
    /// Mirror test results into the result index.
    pub index: bool,
    /// SurrealDB URL of the result index.
    pub index_url: String,
}

impl Default for KimConfig {
    fn default() -> Self {
        Self {
            repository: PathBuf::from("."),
            results: PathBuf::from("./results"),
            scratch: std::env::temp_dir(),
            build_command: "make".to_string(),
            probe_program: None,
            timeout_secs: 0,
            index: false,
            index_url: "mem://".to_string(),
        }
    }
}

impl KimConfig {
    /// Load from `path` (or `kimrun.toml` when present), then apply the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Override fields from `KIMRUN_*` variables as returned by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("KIMRUN_REPOSITORY") {
            self.repository = PathBuf::from(v);
        }
        if let Some(v) = lookup("KIMRUN_RESULTS") {
            self.results = PathBuf::from(v);
        }
        if let Some(v) = lookup("KIMRUN_SCRATCH") {
            self.scratch = PathBuf::from(v);
        }
        if let Some(v) = lookup("KIMRUN_BUILD_COMMAND") {
            self.build_command = v;
        }
        if let Some(v) = lookup("KIMRUN_PROBE_PROGRAM") {
            self.probe_program = if v.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(v))
            };
        }
        if let Some(v) = lookup("KIMRUN_TIMEOUT_SECS") {
            self.timeout_secs = v.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "KIMRUN_TIMEOUT_SECS".to_string(),
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("KIMRUN_INDEX") {
            self.index = v.trim().eq_ignore_ascii_case("true");
        }
        if let Some(v) = lookup("KIMRUN_INDEX_URL") {
            self.index_url = v;
        }
        Ok(())
    }

    /// Build command as program plus arguments.
    pub fn build_argv(&self) -> Vec<String> {
        self.build_command
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = KimConfig::default();
        assert_eq!(config.repository, PathBuf::from("."));
        assert_eq!(config.build_argv(), vec!["make"]);
        assert_eq!(config.timeout_secs, 0);
        assert!(!config.index);
        assert_eq!(config.index_url, "mem://");
        assert!(config.probe_program.is_none());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("kimrun.toml");
        std::fs::write(
            &path,
            "repository = \"/srv/kim\"\nbuild_command = \"make -j4\"\ntimeout_secs = 600\n",
        )
        .unwrap();

        let config = KimConfig::from_file(&path).unwrap();
        assert_eq!(config.repository, PathBuf::from("/srv/kim"));
        assert_eq!(config.build_argv(), vec!["make", "-j4"]);
        assert_eq!(config.timeout_secs, 600);
        assert_eq!(config.results, PathBuf::from("./results"));
    }

    #[test]
    fn test_bad_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("kimrun.toml");
        std::fs::write(&path, "timeout_secs = \"soon\"").unwrap();
        assert!(matches!(
            KimConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            KimConfig::from_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = KimConfig::default();
        config
            .apply_env(env(&[
                ("KIMRUN_RESULTS", "/tmp/out"),
                ("KIMRUN_TIMEOUT_SECS", "30"),
                ("KIMRUN_INDEX", "TRUE"),
                ("KIMRUN_PROBE_PROGRAM", "/usr/bin/kim-probe"),
            ]))
            .unwrap();
        assert_eq!(config.results, PathBuf::from("/tmp/out"));
        assert_eq!(config.timeout_secs, 30);
        assert!(config.index);
        assert_eq!(
            config.probe_program,
            Some(PathBuf::from("/usr/bin/kim-probe"))
        );
    }

    #[test]
    fn test_env_invalid_timeout() {
        let mut config = KimConfig::default();
        let err = config
            .apply_env(env(&[("KIMRUN_TIMEOUT_SECS", "forever")]))
            .unwrap_err();
        assert!(err.to_string().contains("KIMRUN_TIMEOUT_SECS"));
    }
}
