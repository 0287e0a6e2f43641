//! Path resolution for Sprinklr's local files.
//!
//! Resolved once at startup from: CLI `--data-dir` > `SPRINKLR_DATA_DIR` env > `~/.sprinklr`.

use std::io;
use std::path::{Path, PathBuf};

use crate::config::ConfigError;

pub const DATA_DIR_ENV: &str = "SPRINKLR_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    data_dir: PathBuf,
}

impl Paths {
    /// Priority: `explicit` arg > `SPRINKLR_DATA_DIR` env > `~/.sprinklr` default.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve_from(
            explicit,
            std::env::var_os(DATA_DIR_ENV).map(PathBuf::from),
            dirs::home_dir(),
        )
    }

    fn resolve_from(
        explicit: Option<&Path>,
        env_dir: Option<PathBuf>,
        home: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let data_dir = match (explicit, env_dir) {
            (Some(p), _) => p.to_path_buf(),
            (None, Some(dir)) if !dir.as_os_str().is_empty() => dir,
            _ => home.ok_or(ConfigError::NoHomeDir)?.join(".sprinklr"),
        };
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn ensure_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.log_dir())
    }
}
