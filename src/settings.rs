//! Startup settings.
//!
//! Read once before anything else happens. Sources, later ones winning:
//! `conn_launcher.toml` next to the executable (or the file named by
//! `CONN_LAUNCHER_CONFIG`), then the `CONN_LAUNCHER_*` environment variables.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::single_instance::DEFAULT_LOCK_NAME;

pub const CONFIG_FILE_NAME: &str = "conn_launcher.toml";
pub const CONFIG_ENV: &str = "CONN_LAUNCHER_CONFIG";
pub const SINGLE_INSTANCE_ENV: &str = "CONN_LAUNCHER_SINGLE_INSTANCE";
pub const LOCK_NAME_ENV: &str = "CONN_LAUNCHER_LOCK_NAME";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: `{value}`")]
    InvalidEnv { key: &'static str, value: String },
    #[error("lock_name must not be empty")]
    EmptyLockName,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Allow only one running instance per session.
    pub single_instance: bool,
    pub lock_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            single_instance: false,
            lock_name: DEFAULT_LOCK_NAME.to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an injectable environment lookup.
    pub fn load_with<F>(env: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match env(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => match default_config_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        settings.apply_env(&env)?;
        settings.validate()?;
        debug!("settings: {settings:?}");
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env<F>(&mut self, env: &F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = env(SINGLE_INSTANCE_ENV) {
            self.single_instance = parse_flag(&value).ok_or(SettingsError::InvalidEnv {
                key: SINGLE_INSTANCE_ENV,
                value,
            })?;
        }
        if let Some(value) = env(LOCK_NAME_ENV) {
            if value.trim().is_empty() {
                return Err(SettingsError::InvalidEnv {
                    key: LOCK_NAME_ENV,
                    value,
                });
            }
            self.lock_name = value;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.lock_name.trim().is_empty() {
            return Err(SettingsError::EmptyLockName);
        }
        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(CONFIG_FILE_NAME))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
