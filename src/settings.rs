// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bundler settings store access.
//!
//! Bundler decides whether to use a local checkout of a gem by looking up
//! `local.<gem>` in its own settings store. Localctl mirrors the registry
//! into that store, so everything that touches it goes through the
//! [`SettingsStore`] trait. The real implementation shells out to
//! `bundle config`; tests use [`MemoryStore`].

use std::{
    collections::{BTreeMap, BTreeSet},
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, instrument, warn};

/// Namespace of local override keys in Bundler's settings store.
pub const LOCAL_PREFIX: &str = "local.";

/// Key/value access to Bundler's settings.
///
/// Failure to set or unset a key is reported as `false`. Callers treat that
/// as the signal that the store and the registry would drift apart.
pub trait SettingsStore {
    /// Set key to value.
    fn set(&mut self, key: &str, value: &str) -> bool;

    /// Remove key.
    fn unset(&mut self, key: &str) -> bool;

    /// Read every `local.*` entry, keyed by [`listed_name`] of the gem.
    ///
    /// # Errors
    ///
    /// - Return [`Error`] if the store cannot be listed.
    fn local_entries(&self) -> Result<BTreeMap<String, String>>;
}

/// Settings store backed by the `bundle config` command.
///
/// All calls run from the project root with `--local`, so settings land in
/// the project's ".bundle/config" rather than the user's global one.
#[derive(Debug, Clone)]
pub struct BundleConfig {
    program: String,
    project_root: PathBuf,
}

impl BundleConfig {
    /// Construct new Bundler settings store.
    pub fn new(program: impl Into<String>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            project_root: project_root.into(),
        }
    }

    fn call(&self, args: &[&str]) -> Result<String> {
        syscall_non_interactive(&self.program, &self.project_root, args)
    }
}

impl SettingsStore for BundleConfig {
    #[instrument(skip(self), level = "debug")]
    fn set(&mut self, key: &str, value: &str) -> bool {
        match self.call(&["config", "set", "--local", key, value]) {
            Ok(output) => {
                debug!("{output}");
                true
            }
            Err(err) => {
                warn!("{err}");
                false
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn unset(&mut self, key: &str) -> bool {
        match self.call(&["config", "unset", "--local", key]) {
            Ok(output) => {
                debug!("{output}");
                true
            }
            Err(err) => {
                warn!("{err}");
                false
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn local_entries(&self) -> Result<BTreeMap<String, String>> {
        let output = self.call(&["config", "list", "--parseable"])?;
        Ok(parse_local_entries(&output))
    }
}

/// Gem name the way Bundler lists it back.
///
/// Bundler stores `local.RedCloth` as `BUNDLE_LOCAL__REDCLOTH`, and lists it
/// as `local.redcloth`. Names only compare equal after this folding.
pub fn listed_name(name: impl AsRef<str>) -> String {
    name.as_ref().to_lowercase()
}

/// Extract `local.*` entries from `bundle config list --parseable` output.
///
/// Each line has the form `key=value`. Lines that do not belong to the local
/// namespace, or do not look like an entry at all, are skipped.
pub fn parse_local_entries(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.trim().split_once('='))
        .filter_map(|(key, value)| {
            key.strip_prefix(LOCAL_PREFIX)
                .filter(|name| !name.is_empty())
                .map(|name| (listed_name(name), value.to_string()))
        })
        .collect()
}

/// In-memory settings store.
///
/// Keys are kept as written, but listed back through [`listed_name`] just
/// like Bundler does. Keys listed through [`MemoryStore::fail_on`] make every
/// set or unset of that key fail, which is handy for exercising sync failures.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
    failing: BTreeSet<String>,
    fail_listing: bool,
}

impl MemoryStore {
    /// Construct new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed key with value without going through [`SettingsStore::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Make every write to target key fail.
    pub fn fail_on(mut self, key: impl Into<String>) -> Self {
        self.failing.insert(key.into());
        self
    }

    /// Make bulk reads fail.
    pub fn fail_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl SettingsStore for MemoryStore {
    fn set(&mut self, key: &str, value: &str) -> bool {
        if self.failing.contains(key) {
            return false;
        }

        self.values.insert(key.to_string(), value.to_string());
        true
    }

    fn unset(&mut self, key: &str) -> bool {
        if self.failing.contains(key) {
            return false;
        }

        self.values.remove(key);
        true
    }

    fn local_entries(&self) -> Result<BTreeMap<String, String>> {
        if self.fail_listing {
            return Err(Error::Syscall(std::io::Error::other(
                "memory store listing disabled",
            )));
        }

        Ok(self
            .values
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(LOCAL_PREFIX)
                    .map(|name| (listed_name(name), value.clone()))
            })
            .collect())
    }
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    cwd: impl AsRef<Path>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let output = Command::new(cmd.as_ref())
        .args(args)
        .current_dir(cwd.as_ref())
        .output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

    if !output.status.success() {
        let mut message = String::new();
        if !stdout.is_empty() {
            message.push_str(format!("stdout: {stdout}").as_str());
        }

        if !stderr.is_empty() {
            message.push_str(format!("stderr: {stderr}").as_str());
        }

        return Err(Error::Syscall(std::io::Error::other(format!(
            "command {:?} failed:\n{}",
            cmd.as_ref(),
            message.trim_end()
        ))));
    }

    // INVARIANT: Chomp trailing newlines.
    Ok(stdout.trim_end_matches(['\r', '\n']).to_string())
}

/// Settings store error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// External command failed to run or exited unsuccessfully.
    #[error(transparent)]
    Syscall(#[from] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
