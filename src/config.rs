// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Localctl works fine without any configuration at all. Users who need to
//! rename the registry file, track a different ignore file, or point at a
//! specific Bundler executable can do so through an optional TOML file at
//! `$XDG_CONFIG_HOME/localctl/config.toml`.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Name of Bundler's per-project settings directory.
pub const BUNDLE_LOCAL_DIR: &str = ".bundle";

/// Localctl configuration settings.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Registry file name relative to project root.
    pub registry_file: PathBuf,

    /// Ignore file name relative to project root.
    pub ignore_file: PathBuf,

    /// Marker files that identify a project root.
    pub markers: Vec<String>,

    /// Patterns that `install` appends to the ignore file.
    ///
    /// Derived from registry file name and Bundler's local directory when
    /// left unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_patterns: Option<Vec<String>>,

    /// Bundler executable to call for settings store access.
    pub bundle_command: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_file: PathBuf::from(".gemlocal"),
            ignore_file: PathBuf::from(".gitignore"),
            markers: vec!["Gemfile".into(), "gems.rb".into()],
            ignore_patterns: None,
            bundle_command: "bundle".into(),
        }
    }
}

impl Config {
    /// Load configuration file at target path.
    ///
    /// A missing file is not an error, defaults are used instead.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file content is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(data) => {
                debug!("load configuration from {}", path.display());
                data.parse()
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Read {
                source: err,
                path: path.to_path_buf(),
            }),
        }
    }

    /// Patterns that keep localctl's files out of version control.
    pub fn ignore_patterns(&self) -> Vec<String> {
        match &self.ignore_patterns {
            Some(patterns) => patterns.clone(),
            None => vec![
                self.registry_file.display().to_string(),
                BUNDLE_LOCAL_DIR.to_string(),
            ],
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = toml::de::from_str(data)?;

        // INVARIANT: Perform shell expansion on bundle command.
        config.bundle_command = shellexpand::full(config.bundle_command.as_str())?.into_owned();

        Ok(config)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file exists but cannot be read.
    #[error("failed to read configuration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
