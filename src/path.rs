// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where the current project lives, and where localctl keeps its
//! own configuration.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Root directory of a Bundler project.
///
/// A project root is the nearest directory, starting from some directory and
/// walking up through its parents, that contains a __marker__ file, e.g.,
/// "Gemfile" or "gems.rb".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRoot(PathBuf);

impl ProjectRoot {
    /// Use target directory as project root as-is.
    ///
    /// Does not check for any marker file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Locate project root from target directory upwards.
    ///
    /// # Errors
    ///
    /// - Return [`Error::ProjectNotFound`] if no directory from `start` up to
    ///   the file system root contains any of the marker files.
    pub fn discover(
        start: impl AsRef<Path>,
        markers: impl IntoIterator<Item = impl AsRef<Path>> + Clone,
    ) -> Result<Self> {
        let start = start.as_ref();
        for dir in start.ancestors() {
            for marker in markers.clone() {
                if dir.join(marker.as_ref()).is_file() {
                    debug!("found project marker {:?} in {}", marker.as_ref(), dir.display());
                    return Ok(Self(dir.to_path_buf()));
                }
            }
        }

        Err(Error::ProjectNotFound {
            start: start.to_path_buf(),
            markers: markers
                .into_iter()
                .map(|marker| marker.as_ref().display().to_string())
                .collect(),
        })
    }

    /// Locate project root from the current working directory upwards.
    ///
    /// # Errors
    ///
    /// - Return [`Error::CurrentDir`] if current working directory cannot be
    ///   determined.
    /// - Return [`Error::ProjectNotFound`] if no marker file is found.
    pub fn discover_from_cwd(
        markers: impl IntoIterator<Item = impl AsRef<Path>> + Clone,
    ) -> Result<Self> {
        let cwd = std::env::current_dir().map_err(Error::CurrentDir)?;
        Self::discover(cwd, markers)
    }

    /// Resolve path relative to project root.
    pub fn join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.0.join(path)
    }

    /// Treat project root as [`Path`] slice.
    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }
}

/// Determine default absolute path to localctl's configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/localctl/config.toml`.
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`Error::NoConfigDir`] if the configuration directory cannot be
///   determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("localctl").join("config.toml"))
        .ok_or(Error::NoConfigDir)
}

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No project marker found from starting directory upwards.
    #[error("no project found from {:?} upwards (looked for {})", start.display(), markers.join(", "))]
    ProjectNotFound { start: PathBuf, markers: Vec<String> },

    /// Current working directory is unavailable.
    #[error("cannot determine current working directory")]
    CurrentDir(#[source] std::io::Error),

    /// User's configuration directory is unknown.
    #[error("cannot determine absolute path to user's configuration directory")]
    NoConfigDir,
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
