// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Local override registry.
//!
//! Every project keeps track of its local gem overrides in a plain text file
//! at the project root called the __registry file__ (".gemlocal" by default).
//!
//! # Registry File Layout
//!
//! Each non-blank line that does not start with '#' describes exactly one
//! override as three whitespace separated fields:
//!
//! ```text
//! # status name   location
//! on       rack   /home/me/src/rack
//! off      rails  ~/src/rails
//! ```
//!
//! The status is either "on" or "off". Gem names must be unique across the
//! whole file. Any line that breaks these rules makes the whole file invalid;
//! no attempt is made to skip over bad lines.
//!
//! The registry file is always rewritten in full from the in-memory mapping.
//! Comments and blank lines do not survive a rewrite.

use std::{
    collections::{btree_map, BTreeMap},
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, write, OpenOptions},
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

/// Whether a local override is currently handed to Bundler.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Bundler loads the gem from its local location.
    #[default]
    On,

    /// Bundler ignores the local location.
    Off,
}

impl Status {
    /// Flip the status.
    pub fn toggled(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::On => fmt.write_str("on"),
            Self::Off => fmt.write_str("off"),
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            other => Err(format!("unknown status {other:?}, expected \"on\" or \"off\"")),
        }
    }
}

/// A single local gem override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    name: String,
    location: String,
    status: Status,
}

impl Override {
    /// Construct new override.
    pub fn new(name: impl Into<String>, location: impl Into<String>, status: Status) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            status,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Key of this override in Bundler's settings store.
    pub fn settings_key(&self) -> String {
        settings_key(&self.name)
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }
}

impl Display for Override {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{} {} {}", self.status, self.name, self.location)
    }
}

/// Settings store key for a gem name.
pub fn settings_key(name: impl AsRef<str>) -> String {
    format!("local.{}", name.as_ref())
}

/// Ordered mapping of gem name to local override.
///
/// # Invariant
///
/// - Gem names are unique.
/// - Iteration order is sorted by gem name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Overrides {
    entries: BTreeMap<String, Override>,
}

impl Overrides {
    /// Construct new empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace override, keyed by its name.
    ///
    /// Returns the override that was replaced, if any.
    pub fn upsert(&mut self, entry: Override) -> Option<Override> {
        self.entries.insert(entry.name.clone(), entry)
    }

    pub fn remove(&mut self, name: impl AsRef<str>) -> Option<Override> {
        self.entries.remove(name.as_ref())
    }

    pub fn get(&self, name: impl AsRef<str>) -> Option<&Override> {
        self.entries.get(name.as_ref())
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.entries.contains_key(name.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> btree_map::Values<'_, String, Override> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> btree_map::ValuesMut<'_, String, Override> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Overrides {
    type Item = &'a Override;
    type IntoIter = btree_map::Values<'a, String, Override>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Override> for Overrides {
    fn from_iter<I: IntoIterator<Item = Override>>(iter: I) -> Self {
        let mut overrides = Self::new();
        for entry in iter {
            overrides.upsert(entry);
        }
        overrides
    }
}

impl Display for Overrides {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for entry in self.iter() {
            writeln!(fmt, "{entry}")?;
        }

        Ok(())
    }
}

impl FromStr for Overrides {
    type Err = ParseError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let mut overrides = Self::new();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let invalid = |reason: String| ParseError {
                line_number: index + 1,
                line: raw.to_string(),
                reason,
            };

            let fields = line.split_whitespace().collect::<Vec<_>>();
            let [status, name, location] = fields.as_slice() else {
                return Err(invalid(format!(
                    "expected 3 fields \"<status> <name> <location>\", found {}",
                    fields.len()
                )));
            };

            let status = status.parse::<Status>().map_err(invalid)?;
            if overrides.contains(name) {
                return Err(invalid(format!("duplicate entry for {name:?}")));
            }

            overrides.upsert(Override::new(*name, *location, status));
        }

        Ok(overrides)
    }
}

/// Malformed registry line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line_number}: {reason}: {line:?}")]
pub struct ParseError {
    pub line_number: usize,
    pub line: String,
    pub reason: String,
}

/// Registry file on disk.
#[derive(Debug, Clone)]
pub struct RegistryFile {
    path: PathBuf,
}

impl RegistryFile {
    /// Open registry file at target path.
    ///
    /// Creates an empty registry file if it does not exist yet.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Create`] if registry file is missing and cannot be
    ///   created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        // INVARIANT: Create registry file if needed.
        if !path.exists() {
            info!("create registry file at {}", path.display());
        }
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| Error::Create {
                source: err,
                path: path.clone(),
            })?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Read full mapping from registry file.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Read`] if registry file cannot be read.
    /// - Return [`Error::Parse`] if any line of registry file is malformed.
    pub fn read(&self) -> Result<Overrides> {
        let content = read_to_string(&self.path).map_err(|err| Error::Read {
            source: err,
            path: self.path.clone(),
        })?;

        content.parse().map_err(|err| Error::Parse {
            source: err,
            path: self.path.clone(),
        })
    }

    /// Replace registry file content with target mapping.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Write`] if registry file cannot be written to.
    pub fn write(&self, overrides: &Overrides) -> Result<()> {
        debug!(
            "rewrite {} with {} entries",
            self.path.display(),
            overrides.len()
        );
        write(&self.path, overrides.to_string().as_bytes()).map_err(|err| Error::Write {
            source: err,
            path: self.path.clone(),
        })
    }
}

/// Registry file error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Registry file cannot be created when missing.
    #[error("failed to create registry file at {:?}", path.display())]
    Create {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Registry file cannot be read from.
    #[error("failed to read from registry file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Registry file cannot be written to.
    #[error("failed to write to registry file at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Registry file contains a malformed line.
    #[error("malformed registry file at {:?}", path.display())]
    Parse {
        #[source]
        source: ParseError,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
