use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{ClaudioError, Result};
use crate::storage::SoundDb;

/// Prefix for environment overrides, e.g. `CLAUDIO_TRACKING__ENABLED=false`.
pub const ENV_PREFIX: &str = "CLAUDIO";

/// Levels accepted by `[logging] level`.
pub const VALID_LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudioConfig {
    /// Master switch. When false the hook exits without doing anything.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Soundpack name, directory, or JSON mapping file.
    #[serde(default = "default_soundpack")]
    pub default_soundpack: String,
    /// Extra directories searched for named soundpacks, in order.
    #[serde(default)]
    pub soundpack_paths: Vec<PathBuf>,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Custom database path. Defaults to `<cache>/claudio/sounds.db`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_volume() -> f32 {
    0.5
}
fn default_soundpack() -> String {
    "default".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ClaudioConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ClaudioConfig {
    /// Load configuration with a layered merge, later layers winning:
    /// 1. `<config_dir>/claudio/config.toml` (global)
    /// 2. `<project>/.claudio/config.toml` (project)
    /// 3. `<project>/.claudio/config.local.toml` (local, gitignored)
    /// 4. `CLAUDIO_*` environment variables
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut files = Vec::new();
        if let Some(global) = global_config_path() {
            files.push(global);
        }
        if let Some(dir) = project_dir {
            files.push(dir.join(".claudio").join("config.toml"));
            files.push(dir.join(".claudio").join("config.local.toml"));
        }
        Self::load_layers(&files, env_source())
    }

    fn load_layers(files: &[PathBuf], env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        for path in files.iter().filter(|p| p.is_file()) {
            builder = builder.add_source(File::from(path.as_path()).required(false));
        }
        builder = builder.add_source(env);

        let config = builder
            .build()
            .map_err(|e| ClaudioError::Config(e.to_string()))?;

        let mut cfg: Self = config
            .try_deserialize()
            .map_err(|e| ClaudioError::Config(e.to_string()))?;

        cfg.validate();
        Ok(cfg)
    }

    /// Defaults only, no files or environment.
    pub fn default_config() -> Self {
        Self {
            enabled: true,
            volume: default_volume(),
            default_soundpack: default_soundpack(),
            soundpack_paths: Vec::new(),
            tracking: TrackingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Fix out-of-range values in place and return what was changed.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !(0.0..=1.0).contains(&self.volume) {
            let clamped = if self.volume.is_nan() {
                default_volume()
            } else {
                self.volume.clamp(0.0, 1.0)
            };
            warnings.push(format!(
                "volume = {} out of range [0.0, 1.0], using {clamped}",
                self.volume
            ));
            self.volume = clamped;
        }

        if self.default_soundpack.trim().is_empty() {
            warnings.push("default_soundpack is empty, using 'default'".to_string());
            self.default_soundpack = default_soundpack();
        }

        let level = self.logging.level.trim().to_lowercase();
        if VALID_LOG_LEVELS.contains(&level.as_str()) {
            self.logging.level = level;
        } else {
            warnings.push(format!(
                "unknown logging.level '{}', valid: {}",
                self.logging.level,
                VALID_LOG_LEVELS.join(", ")
            ));
            self.logging.level = default_log_level();
        }

        if let Some(path) = &self.tracking.db_path {
            if path.is_dir() {
                warnings.push(format!(
                    "tracking.db_path {} is a directory, using the default location",
                    path.display()
                ));
                self.tracking.db_path = None;
            }
        }

        for w in &warnings {
            tracing::warn!("config: {}", w);
        }

        warnings
    }

    /// Directories searched for named soundpacks, in priority order.
    pub fn soundpack_search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.soundpack_paths.clone();
        if let Some(config) = dirs::config_dir() {
            dirs.push(config.join("claudio").join("soundpacks"));
        }
        if let Some(data) = dirs::data_dir() {
            dirs.push(data.join("claudio").join("soundpacks"));
        }
        dirs
    }

    /// Database the tracker writes to, `None` if no location can be found.
    pub fn db_path(&self) -> Option<PathBuf> {
        self.tracking.db_path.clone().or_else(SoundDb::default_path)
    }
}

/// `<config_dir>/claudio/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("claudio").join("config.toml"))
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("soundpack_paths")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("claudio-cfg-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(dir.join(".claudio")).unwrap();
        dir
    }

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env_source().source(Some(map))
    }

    #[test]
    fn test_default_config() {
        let config = ClaudioConfig::default_config();
        assert!(config.enabled);
        assert!((config.volume - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.default_soundpack, "default");
        assert!(config.tracking.enabled);
        assert!(config.tracking.db_path.is_none());
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_config_no_files() {
        let config = ClaudioConfig::load_layers(&[], env(&[])).unwrap();
        assert_eq!(config.default_soundpack, "default");
        assert!(config.enabled);
    }

    #[test]
    fn test_local_overrides_project() {
        let dir = temp_dir();
        let project = dir.join(".claudio").join("config.toml");
        let local = dir.join(".claudio").join("config.local.toml");
        std::fs::write(&project, "volume = 0.8\ndefault_soundpack = \"retro\"\n").unwrap();
        std::fs::write(&local, "volume = 0.2\n").unwrap();

        let config = ClaudioConfig::load_layers(&[project, local], env(&[])).unwrap();
        assert!((config.volume - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.default_soundpack, "retro");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_env_overrides_files() {
        let dir = temp_dir();
        let project = dir.join(".claudio").join("config.toml");
        std::fs::write(&project, "[tracking]\nenabled = true\n").unwrap();

        let config = ClaudioConfig::load_layers(
            &[project],
            env(&[
                ("CLAUDIO_TRACKING__ENABLED", "false"),
                ("CLAUDIO_TRACKING__DB_PATH", "/tmp/claudio-test.db"),
                ("CLAUDIO_DEFAULT_SOUNDPACK", "chiptune"),
                ("CLAUDIO_VOLUME", "0.3"),
            ]),
        )
        .unwrap();
        assert!(!config.tracking.enabled);
        assert_eq!(
            config.tracking.db_path.as_deref(),
            Some(Path::new("/tmp/claudio-test.db"))
        );
        assert_eq!(config.default_soundpack, "chiptune");
        assert!((config.volume - 0.3).abs() < 1e-6);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let config = ClaudioConfig::load_layers(
            &[PathBuf::from("/nonexistent/claudio/config.toml")],
            env(&[]),
        )
        .unwrap();
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = temp_dir();
        let project = dir.join(".claudio").join("config.toml");
        std::fs::write(&project, "volume = [not toml").unwrap();
        let err = ClaudioConfig::load_layers(&[project], env(&[])).unwrap_err();
        assert!(matches!(err, ClaudioError::Config(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_validate_clamps_volume() {
        let mut config = ClaudioConfig::default_config();
        config.volume = 3.0;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 1);
        assert!((config.volume - 1.0).abs() < f32::EPSILON);

        config.volume = -1.0;
        config.validate();
        assert_eq!(config.volume, 0.0);
    }

    #[test]
    fn test_validate_resets_bad_values() {
        let mut config = ClaudioConfig::default_config();
        config.default_soundpack = "  ".into();
        config.logging.level = "LOUD".into();
        let warnings = config.validate();
        assert_eq!(warnings.len(), 2);
        assert_eq!(config.default_soundpack, "default");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_validate_normalizes_level_case() {
        let mut config = ClaudioConfig::default_config();
        config.logging.level = "DEBUG".into();
        assert!(config.validate().is_empty());
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_db_path_override() {
        let mut config = ClaudioConfig::default_config();
        config.tracking.db_path = Some(PathBuf::from("/tmp/x.db"));
        assert_eq!(config.db_path(), Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn test_search_dirs_start_with_configured_paths() {
        let mut config = ClaudioConfig::default_config();
        config.soundpack_paths = vec![PathBuf::from("/opt/packs")];
        let dirs = config.soundpack_search_dirs();
        assert_eq!(dirs[0], PathBuf::from("/opt/packs"));
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = ClaudioConfig::default_config();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ClaudioConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_soundpack, config.default_soundpack);
        assert_eq!(parsed.tracking.enabled, config.tracking.enabled);
    }
}
