// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Ignore file handling.
//!
//! The registry file and Bundler's ".bundle" directory are personal to each
//! developer, so they should never end up in version control. Localctl can
//! append patterns for them to the project's ignore file.
//!
//! Patterns are only ever appended. A pattern counts as already present when
//! any existing line contains it, so hand-written variants like "/.bundle/"
//! are left alone instead of being duplicated.

use std::{
    fs::{read_to_string, write},
    io::ErrorKind,
    path::PathBuf,
};
use tracing::debug;

/// Append-only editor for an ignore file.
#[derive(Debug, Clone)]
pub struct IgnoreFile {
    path: PathBuf,
}

impl IgnoreFile {
    /// Construct new ignore file editor.
    ///
    /// The ignore file itself does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append every pattern not already present.
    ///
    /// Returns the patterns that were actually appended, in order. The file
    /// is left untouched when nothing needs appending.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Read`] if existing ignore file cannot be read.
    /// - Return [`Error::Write`] if ignore file cannot be written to.
    pub fn ensure_patterns(
        &self,
        patterns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Vec<String>> {
        let mut content = match read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(Error::Read {
                    source: err,
                    path: self.path.clone(),
                })
            }
        };

        let mut appended = Vec::new();
        for pattern in patterns.into_iter().map(Into::into) {
            if is_present(&content, &pattern) {
                debug!("{pattern:?} already in {}", self.path.display());
                continue;
            }

            // INVARIANT: Appended pattern always starts on its own line.
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(&pattern);
            content.push('\n');
            appended.push(pattern);
        }

        if appended.is_empty() {
            return Ok(appended);
        }

        write(&self.path, content.as_bytes()).map_err(|err| Error::Write {
            source: err,
            path: self.path.clone(),
        })?;

        Ok(appended)
    }
}

fn is_present(content: &str, pattern: &str) -> bool {
    content.lines().any(|line| line.contains(pattern))
}

/// Ignore file error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Ignore file exists but cannot be read from.
    #[error("failed to read from ignore file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Ignore file cannot be written to.
    #[error("failed to write to ignore file at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
