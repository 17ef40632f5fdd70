use std::path::{Path, PathBuf};
use std::time::Duration;

use covergate_types::CodePolicy;
use serde::Deserialize;
use thiserror::Error;

use crate::wipe::{WipePlan, WipeTarget};

/// Pause between acknowledging a panic code and starting the wipe.
pub const DEFAULT_WIPE_DELAY_MS: u64 = 1000;

const STORE_FILE_NAME: &str = "secure.bin";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid code bounds in {path}: {source}")]
    Codes {
        path: PathBuf,
        #[source]
        source: covergate_types::CodeError,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Codes { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub store: StoreConfig,
    pub wipe: WipeConfig,
    pub codes: CodesConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Sealed credential file. Defaults to `~/.covergate/secure.bin`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WipeConfig {
    pub delay_ms: u64,
    pub scrub_files: bool,
    /// Empty by default. [`CoverGate::open`](crate::CoverGate::open) refuses
    /// to start until at least one is listed.
    pub targets: Vec<WipeTarget>,
}

impl Default for WipeConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_WIPE_DELAY_MS,
            scrub_files: false,
            targets: Vec::new(),
        }
    }
}

impl WipeConfig {
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Build the plan, preserving `store_path` if the store lives on disk.
    #[must_use]
    pub fn plan(&self, store_path: Option<&Path>) -> WipePlan {
        let plan = WipePlan::new()
            .targets(self.targets.iter().map(|t| WipeTarget {
                kind: t.kind,
                path: expand_home(&t.path),
            }))
            .scrub_files(self.scrub_files);
        match store_path {
            Some(path) => plan.preserve(path),
            None => plan,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodesConfig {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for CodesConfig {
    fn default() -> Self {
        let policy = CodePolicy::default();
        Self {
            min_len: policy.min_len,
            max_len: policy.max_len,
        }
    }
}

impl GateConfig {
    /// Load from `~/.covergate/config.toml`. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), "Failed to read config: {err}");
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        let config: Self = match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), "Failed to parse config: {err}");
                return Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        config.code_policy().map_err(|source| ConfigError::Codes {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config)
    }

    /// Resolved store file, with `~/` expanded.
    #[must_use]
    pub fn store_path(&self) -> Option<PathBuf> {
        match &self.store.path {
            Some(path) => Some(expand_home(path)),
            None => config_dir().map(|dir| dir.join(STORE_FILE_NAME)),
        }
    }

    pub fn code_policy(&self) -> Result<CodePolicy, covergate_types::CodeError> {
        CodePolicy::new(self.codes.min_len, self.codes.max_len)
    }
}

#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".covergate"))
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest)),
        Err(_) => path.to_path_buf(),
    }
}
