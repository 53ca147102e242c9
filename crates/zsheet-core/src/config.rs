//! Session configuration loaded from TOML.
//!
//! ```toml
//! rows = 50
//! cols = 26
//! recovery_interval_secs = 30
//! scale_factor = 1.5
//! backend = "auto"        # auto | portable | parallel
//! data_dir = "/tmp/zsheet"
//! ```
//!
//! Every key is optional. The default location is `config.toml` in the
//! platform config directory for `zsheet`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use zsheet_engine::accel::BackendPreference;

use crate::error::{Result, ZsheetError};
use crate::storage::zsff::MAX_CELLS;

/// Environment variable that overrides `backend`.
pub const BACKEND_ENV: &str = "ZSHEET_BACKEND";

/// File name of the auto-recovery snapshot inside the data directory.
pub const RECOVERY_FILE: &str = "recovery.zsff";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub rows: usize,
    pub cols: usize,
    pub recovery_enabled: bool,
    pub recovery_interval_secs: u64,
    /// Directory for recovery snapshots and log files.
    pub data_dir: Option<PathBuf>,
    /// Factor used by the SCALE bulk operation.
    pub scale_factor: f64,
    pub backend: BackendPreference,
    /// Re-evaluate every formula after each edit.
    pub recalc_on_edit: bool,
    /// Also write telemetry to `<data_dir>/logs`.
    pub file_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rows: 50,
            cols: 26,
            recovery_enabled: true,
            recovery_interval_secs: 30,
            data_dir: None,
            scale_factor: 1.5,
            backend: BackendPreference::Auto,
            recalc_on_edit: false,
            file_logs: true,
        }
    }
}

impl Config {
    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Config> {
        let config: Config =
            toml::from_str(content).map_err(|e| ZsheetError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or from the default location when `path` is None.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .map_err(|e| ZsheetError::Config(format!("{}: {}", p.display(), e)))?;
                Self::from_toml_str(&content)?
            }
            None => match Self::default_path() {
                Some(p) if p.exists() => {
                    let content = std::fs::read_to_string(&p)?;
                    Self::from_toml_str(&content)?
                }
                _ => Config::default(),
            },
        };
        config.apply_env(std::env::var(BACKEND_ENV).ok().as_deref())?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        let proj = ProjectDirs::from("", "", "zsheet")?;
        let mut path = proj.config_dir().to_path_buf();
        path.push("config.toml");
        Some(path)
    }

    /// Apply an override for `backend` taken from the environment.
    pub fn apply_env(&mut self, backend: Option<&str>) -> Result<()> {
        if let Some(value) = backend {
            self.backend = value
                .parse()
                .map_err(|e: String| ZsheetError::Config(format!("{BACKEND_ENV}: {e}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ZsheetError::Config(format!(
                "grid must have at least one row and column (got {}x{})",
                self.rows, self.cols
            )));
        }
        match self.rows.checked_mul(self.cols) {
            Some(n) if n <= MAX_CELLS => {}
            _ => {
                return Err(ZsheetError::Config(format!(
                    "grid {}x{} exceeds {} cells",
                    self.rows, self.cols, MAX_CELLS
                )));
            }
        }
        if self.recovery_interval_secs == 0 {
            return Err(ZsheetError::Config(
                "recovery_interval_secs must be positive".to_string(),
            ));
        }
        if !self.scale_factor.is_finite() {
            return Err(ZsheetError::Config(
                "scale_factor must be a finite number".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved data directory (not created here).
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        match ProjectDirs::from("", "", "zsheet") {
            Some(proj) => proj.data_dir().to_path_buf(),
            None => PathBuf::from("zsheet-data"),
        }
    }

    pub fn recovery_path(&self) -> PathBuf {
        self.data_dir().join(RECOVERY_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_secs(self.recovery_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!((config.rows, config.cols), (50, 26));
        assert_eq!(config.recovery_interval(), Duration::from_secs(30));
        assert_eq!(config.scale_factor, 1.5);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = Config::from_toml_str(
            "rows = 10\ncols = 4\nbackend = \"portable\"\ndata_dir = \"/tmp/zs\"\n",
        )
        .unwrap();
        assert_eq!((config.rows, config.cols), (10, 4));
        assert_eq!(config.backend, BackendPreference::Portable);
        assert_eq!(config.recovery_path(), PathBuf::from("/tmp/zs/recovery.zsff"));
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/zs/logs"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            Config::from_toml_str("rows = 0"),
            Err(ZsheetError::Config(_))
        ));
        assert!(Config::from_toml_str("recovery_interval_secs = 0").is_err());
        assert!(Config::from_toml_str("scale_factor = nan").is_err());
        assert!(Config::from_toml_str("rows = 100000\ncols = 100000").is_err());
        assert!(Config::from_toml_str("colour = \"green\"").is_err());
        assert!(Config::from_toml_str("rows = \"many\"").is_err());
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        config.apply_env(Some("parallel")).unwrap();
        assert_eq!(config.backend, BackendPreference::Parallel);
        config.apply_env(None).unwrap();
        assert_eq!(config.backend, BackendPreference::Parallel);
        assert!(config.apply_env(Some("quantum")).is_err());
    }

    #[test]
    fn test_load_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ZsheetError::Config(_))
        ));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "rows = 5\ncols = 5\nrecalc_on_edit = true\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!((config.rows, config.cols), (5, 5));
        assert!(config.recalc_on_edit);
    }
}
