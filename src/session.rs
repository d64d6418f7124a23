// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Command session.
//!
//! A [`Session`] owns everything a single localctl invocation works with:
//! the project root, the configuration, the settings store, and a cached copy
//! of the registry file's mapping. The cache is loaded on first use and only
//! thrown away through [`Session::reload`].
//!
//! # Sync Ordering
//!
//! Every operation that changes what Bundler sees talks to the settings store
//! _before_ touching the registry file. The registry file is only rewritten
//! once the store has accepted the change. A rejected store call leaves the
//! registry file exactly as it was.

use crate::{
    config::Config,
    ignore_file::IgnoreFile,
    path::ProjectRoot,
    registry::{settings_key, Override, Overrides, RegistryFile, Status},
    settings::{listed_name, BundleConfig, SettingsStore},
};

use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// State of one localctl invocation.
#[derive(Debug)]
pub struct Session<S = BundleConfig>
where
    S: SettingsStore,
{
    root: ProjectRoot,
    config: Config,
    store: S,
    cache: Option<Overrides>,
}

impl Session<BundleConfig> {
    /// Open session for project containing the current working directory.
    ///
    /// Uses `bundle config` as the settings store.
    ///
    /// # Errors
    ///
    /// - Return [`crate::path::Error::ProjectNotFound`] if no project marker
    ///   can be found.
    pub fn open(config: Config) -> crate::path::Result<Self> {
        let root = ProjectRoot::discover_from_cwd(&config.markers)?;
        let store = BundleConfig::new(config.bundle_command.clone(), root.as_path());
        Ok(Self::new(root, config, store))
    }
}

impl<S> Session<S>
where
    S: SettingsStore,
{
    /// Construct new session.
    pub fn new(root: ProjectRoot, config: Config, store: S) -> Self {
        Self {
            root,
            config,
            store,
            cache: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Absolute path to registry file.
    pub fn registry_path(&self) -> PathBuf {
        self.root.join(&self.config.registry_file)
    }

    /// Throw away cached mapping.
    ///
    /// Next access reads the registry file again.
    pub fn reload(&mut self) {
        debug!("invalidate cached registry");
        self.cache = None;
    }

    /// Register local override and turn it on.
    ///
    /// Replaces the location of an existing override with the same name.
    /// Location is shell expanded first.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Validation`] if name or location is unusable.
    /// - Return [`Error::Sync`] if settings store rejects the location.
    /// - Return [`Error::Registry`] if registry file cannot be read or
    ///   written.
    #[instrument(skip(self), level = "debug")]
    pub fn add(&mut self, name: &str, location: &str) -> Result<Override> {
        validate_name(name)?;
        let location = expand_location(location)?;

        // INVARIANT: Malformed registry file fails before settings store is touched.
        self.overrides()?;

        let key = settings_key(name);
        if !self.store.set(&key, &location) {
            return Err(Error::sync_set(key, &location));
        }

        let entry = Override::new(name, location, Status::On);
        if let Some(previous) = self.overrides()?.upsert(entry.clone()) {
            info!("replace existing override {previous}");
        }
        self.persist()?;

        Ok(entry)
    }

    /// List overrides.
    ///
    /// Lists every override when `name` is `None`.
    ///
    /// # Errors
    ///
    /// - Return [`Error::NotFound`] if named override does not exist.
    /// - Return [`Error::Registry`] if registry file cannot be read.
    pub fn status(&mut self, name: Option<&str>) -> Result<Vec<Override>> {
        let overrides = self.overrides()?;
        match name {
            Some(name) => overrides
                .get(name)
                .cloned()
                .map(|entry| vec![entry])
                .ok_or_else(|| Error::NotFound { name: name.into() }),
            None => Ok(overrides.iter().cloned().collect()),
        }
    }

    /// Forget local override.
    ///
    /// An override that is currently on is unset from the settings store
    /// first. Removing an unknown name does nothing and returns `None`.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Sync`] if settings store refuses to unset the key.
    /// - Return [`Error::Registry`] if registry file cannot be read or
    ///   written.
    #[instrument(skip(self), level = "debug")]
    pub fn remove(&mut self, name: &str) -> Result<Option<Override>> {
        let Some(entry) = self.overrides()?.get(name).cloned() else {
            warn!("no local override named {name:?}, nothing to remove");
            return Ok(None);
        };

        if entry.status().is_on() && !self.store.unset(&entry.settings_key()) {
            return Err(Error::sync_unset(entry.settings_key()));
        }

        self.overrides()?.remove(name);
        self.persist()?;

        Ok(Some(entry))
    }

    /// Turn overrides on.
    ///
    /// Applies to every override when `names` is empty. Each override is
    /// synced and persisted on its own, so a failure part way through keeps
    /// whatever was already turned on.
    ///
    /// # Errors
    ///
    /// - Return [`Error::NotFound`] if any named override does not exist.
    /// - Return [`Error::Sync`] if settings store rejects an override.
    /// - Return [`Error::Registry`] if registry file cannot be read or
    ///   written.
    pub fn enable(&mut self, names: &[String]) -> Result<Vec<Override>> {
        self.switch(names, |_| Status::On)
    }

    /// Turn overrides off.
    ///
    /// Mirror of [`Session::enable`].
    ///
    /// # Errors
    ///
    /// - Return [`Error::NotFound`] if any named override does not exist.
    /// - Return [`Error::Sync`] if settings store refuses to unset a key.
    /// - Return [`Error::Registry`] if registry file cannot be read or
    ///   written.
    pub fn disable(&mut self, names: &[String]) -> Result<Vec<Override>> {
        self.switch(names, |_| Status::Off)
    }

    /// Flip overrides between on and off.
    ///
    /// # Errors
    ///
    /// Same as [`Session::enable`] and [`Session::disable`].
    pub fn toggle(&mut self, names: &[String]) -> Result<Vec<Override>> {
        self.switch(names, Status::toggled)
    }

    /// Rebuild registry file from settings store.
    ///
    /// Settings store is treated as the source of truth: every known override
    /// with a `local.<name>` entry is turned on with the stored location,
    /// every other override is turned off. Unknown `local.*` entries are not
    /// imported.
    ///
    /// # Errors
    ///
    /// - Return [`Error::SyncListing`] if settings store cannot be listed.
    /// - Return [`Error::Registry`] if registry file cannot be read or
    ///   written.
    #[instrument(skip(self), level = "debug")]
    pub fn rebuild(&mut self) -> Result<Vec<Override>> {
        let stored = self
            .store
            .local_entries()
            .map_err(|source| Error::SyncListing { source })?;

        // INVARIANT: Rebuild from registry file, not from a possibly stale cache.
        self.reload();
        let mut overrides = self.overrides()?.clone();
        for entry in overrides.iter_mut() {
            match stored.get(&listed_name(entry.name())) {
                Some(location) => {
                    entry.set_location(location.as_str());
                    entry.set_status(Status::On);
                }
                None => entry.set_status(Status::Off),
            }
        }

        let registered = overrides
            .iter()
            .map(|entry| listed_name(entry.name()))
            .collect::<Vec<_>>();
        for name in stored.keys().filter(|name| !registered.contains(name)) {
            debug!("ignore unregistered settings entry {}", settings_key(name));
        }

        self.registry_file()?.write(&overrides)?;
        self.reload();

        self.status(None)
    }

    /// Keep registry file and Bundler's local directory out of version
    /// control.
    ///
    /// Returns the ignore patterns that were appended.
    ///
    /// # Errors
    ///
    /// - Return [`Error::IgnoreFile`] if ignore file cannot be read or
    ///   written.
    pub fn install(&mut self) -> Result<Vec<String>> {
        let ignore = IgnoreFile::new(self.root.join(&self.config.ignore_file));
        Ok(ignore.ensure_patterns(self.config.ignore_patterns())?)
    }

    /// Path of ignore file relative to project root.
    pub fn ignore_file(&self) -> &Path {
        self.config.ignore_file.as_path()
    }

    fn switch(
        &mut self,
        names: &[String],
        target: impl Fn(Status) -> Status,
    ) -> Result<Vec<Override>> {
        let selected = self.select(names)?;
        let mut changed = Vec::with_capacity(selected.len());

        for name in selected {
            let Some(mut entry) = self.overrides()?.get(&name).cloned() else {
                return Err(Error::NotFound { name });
            };

            let status = target(entry.status());
            let key = entry.settings_key();
            let synced = match status {
                Status::On => self.store.set(&key, entry.location()),
                Status::Off => self.store.unset(&key),
            };

            if !synced {
                return Err(match status {
                    Status::On => Error::sync_set(key, entry.location()),
                    Status::Off => Error::sync_unset(key),
                });
            }

            entry.set_status(status);
            self.overrides()?.upsert(entry.clone());
            self.persist()?;
            changed.push(entry);
        }

        Ok(changed)
    }

    fn select(&mut self, names: &[String]) -> Result<Vec<String>> {
        let overrides = self.overrides()?;
        if names.is_empty() {
            return Ok(overrides.names());
        }

        for name in names {
            if !overrides.contains(name) {
                return Err(Error::NotFound { name: name.clone() });
            }
        }

        Ok(names.to_vec())
    }

    fn registry_file(&self) -> Result<RegistryFile> {
        Ok(RegistryFile::open(self.registry_path())?)
    }

    fn overrides(&mut self) -> Result<&mut Overrides> {
        let overrides = match self.cache.take() {
            Some(overrides) => overrides,
            None => self.registry_file()?.read()?,
        };

        Ok(self.cache.insert(overrides))
    }

    fn persist(&mut self) -> Result<()> {
        let file = self.registry_file()?;
        let overrides = self.overrides()?;
        file.write(overrides)?;

        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid("gem name cannot be empty"));
    }

    if name.starts_with('#') {
        return Err(Error::invalid(format!("gem name {name:?} cannot start with '#'")));
    }

    if name.chars().any(char::is_whitespace) {
        return Err(Error::invalid(format!("gem name {name:?} cannot contain whitespace")));
    }

    Ok(())
}

fn expand_location(location: &str) -> Result<String> {
    let expanded = shellexpand::full(location)
        .map_err(|err| Error::invalid(format!("cannot expand location {location:?}: {err}")))?
        .into_owned();

    if expanded.is_empty() {
        return Err(Error::invalid("location cannot be empty"));
    }

    if expanded.chars().any(char::is_whitespace) {
        return Err(Error::invalid(format!(
            "location {expanded:?} cannot contain whitespace"
        )));
    }

    Ok(expanded)
}

/// Session error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Command arguments are missing, extra, or unusable.
    #[error("invalid arguments: {reason}")]
    Validation { reason: String },

    /// Named override does not exist.
    #[error("no local override named {name:?}")]
    NotFound { name: String },

    /// Settings store refused a change.
    #[error("failed to sync {key:?} with bundler settings, {hint}")]
    Sync { key: String, hint: String },

    /// Settings store cannot be listed.
    #[error("failed to read local overrides from bundler settings, check that `bundle config list` works in this project")]
    SyncListing {
        #[source]
        source: crate::settings::Error,
    },

    /// Registry file access fails.
    #[error(transparent)]
    Registry(#[from] crate::registry::Error),

    /// Ignore file access fails.
    #[error(transparent)]
    IgnoreFile(#[from] crate::ignore_file::Error),
}

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    fn sync_set(key: String, location: &str) -> Self {
        let hint = format!("try `bundle config set --local {key} {location}` to see why");
        Self::Sync { key, hint }
    }

    fn sync_unset(key: String) -> Self {
        let hint = format!("try `bundle config unset --local {key}` to see why");
        Self::Sync { key, hint }
    }
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryStore;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{read_to_string, write};

    fn session(store: MemoryStore) -> anyhow::Result<Session<MemoryStore>> {
        let root = ProjectRoot::new(std::env::current_dir()?);
        Ok(Session::new(root, Config::default(), store))
    }

    #[sealed_test]
    fn add_syncs_then_persists() -> anyhow::Result<()> {
        let mut session = session(MemoryStore::new())?;
        let entry = session.add("rack", "/tmp/rack")?;
        assert_eq!(entry, Override::new("rack", "/tmp/rack", Status::On));
        assert_eq!(session.store().get("local.rack"), Some("/tmp/rack"));
        assert_eq!(read_to_string(".gemlocal")?, "on rack /tmp/rack\n");

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/tester")])]
    fn add_expands_location() -> anyhow::Result<()> {
        let mut session = session(MemoryStore::new())?;
        let entry = session.add("rack", "~/src/rack")?;
        assert_eq!(entry.location(), "/home/tester/src/rack");

        Ok(())
    }

    #[sealed_test]
    fn add_rejects_whitespace() -> anyhow::Result<()> {
        let mut session = session(MemoryStore::new())?;
        let result = session.add("rack", "/tmp/my rack");
        assert!(matches!(result, Err(Error::Validation { .. })));
        let result = session.add("#rack", "/tmp/rack");
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[sealed_test]
    fn add_leaves_registry_alone_on_sync_failure() -> anyhow::Result<()> {
        let mut session = session(MemoryStore::new().fail_on("local.rack"))?;
        let result = session.add("rack", "/tmp/rack");
        assert!(matches!(result, Err(Error::Sync { .. })));
        assert_eq!(read_to_string(".gemlocal")?, "");

        Ok(())
    }

    #[sealed_test]
    fn remove_missing_name_is_noop() -> anyhow::Result<()> {
        let mut session = session(MemoryStore::new())?;
        assert_eq!(session.remove("rack")?, None);

        Ok(())
    }

    #[sealed_test]
    fn remove_unsets_enabled_override() -> anyhow::Result<()> {
        let mut session = session(MemoryStore::new())?;
        session.add("rack", "/tmp/rack")?;
        let removed = session.remove("rack")?;
        assert_eq!(removed, Some(Override::new("rack", "/tmp/rack", Status::On)));
        assert_eq!(session.store().get("local.rack"), None);
        assert!(matches!(
            session.status(Some("rack")),
            Err(Error::NotFound { .. })
        ));

        Ok(())
    }

    #[sealed_test]
    fn switch_keeps_prior_status_on_failure() -> anyhow::Result<()> {
        write(
            ".gemlocal",
            indoc! {r#"
                off puma /src/puma
                off rack /src/rack
            "#},
        )?;
        let mut session = session(MemoryStore::new().fail_on("local.rack"))?;

        let result = session.enable(&[]);
        assert!(matches!(result, Err(Error::Sync { ref key, .. }) if key == "local.rack"));

        session.reload();
        let expect = vec![
            Override::new("puma", "/src/puma", Status::On),
            Override::new("rack", "/src/rack", Status::Off),
        ];
        assert_eq!(session.status(None)?, expect);

        Ok(())
    }

    #[sealed_test]
    fn disable_keeps_override_on_unset_failure() -> anyhow::Result<()> {
        write(".gemlocal", "on rack /src/rack\n")?;
        let store = MemoryStore::new()
            .with("local.rack", "/src/rack")
            .fail_on("local.rack");
        let mut session = session(store)?;

        let result = session.disable(&[]);
        assert!(matches!(result, Err(Error::Sync { ref key, .. }) if key == "local.rack"));
        assert_eq!(session.store().get("local.rack"), Some("/src/rack"));
        assert_eq!(read_to_string(".gemlocal")?, "on rack /src/rack\n");

        Ok(())
    }

    #[sealed_test]
    fn remove_keeps_override_on_unset_failure() -> anyhow::Result<()> {
        write(".gemlocal", "on rack /src/rack\n")?;
        let store = MemoryStore::new()
            .with("local.rack", "/src/rack")
            .fail_on("local.rack");
        let mut session = session(store)?;

        let result = session.remove("rack");
        assert!(matches!(result, Err(Error::Sync { ref key, .. }) if key == "local.rack"));
        assert_eq!(session.store().get("local.rack"), Some("/src/rack"));
        assert_eq!(read_to_string(".gemlocal")?, "on rack /src/rack\n");

        session.reload();
        let expect = vec![Override::new("rack", "/src/rack", Status::On)];
        assert_eq!(session.status(Some("rack"))?, expect);

        Ok(())
    }

    #[sealed_test]
    fn toggle_flips_each_override() -> anyhow::Result<()> {
        write(".gemlocal", "on puma /src/puma\noff rack /src/rack\n")?;
        let mut session = session(MemoryStore::new().with("local.puma", "/src/puma"))?;

        session.toggle(&[])?;
        assert_eq!(session.store().get("local.puma"), None);
        assert_eq!(session.store().get("local.rack"), Some("/src/rack"));
        assert_eq!(read_to_string(".gemlocal")?, "off puma /src/puma\non rack /src/rack\n");

        Ok(())
    }

    #[sealed_test]
    fn unknown_name_fails_before_any_sync() -> anyhow::Result<()> {
        write(".gemlocal", "off puma /src/puma\n")?;
        let mut session = session(MemoryStore::new())?;

        let result = session.enable(&["puma".into(), "rack".into()]);
        assert!(matches!(result, Err(Error::NotFound { ref name }) if name == "rack"));
        assert_eq!(session.store().get("local.puma"), None);

        Ok(())
    }

    #[sealed_test]
    fn rebuild_fails_when_store_cannot_be_listed() -> anyhow::Result<()> {
        let mut session = session(MemoryStore::new().fail_listing())?;
        assert!(matches!(session.rebuild(), Err(Error::SyncListing { .. })));

        Ok(())
    }

    #[sealed_test]
    fn rebuild_matches_names_bundler_lists_in_lowercase() -> anyhow::Result<()> {
        write(".gemlocal", "off puma /src/puma\n")?;
        let mut session = session(MemoryStore::new().with("local.Unknown", "/src/unknown"))?;
        session.add("RedCloth", "/src/RedCloth")?;

        let result = session.rebuild()?;
        let expect = vec![
            Override::new("RedCloth", "/src/RedCloth", Status::On),
            Override::new("puma", "/src/puma", Status::Off),
        ];
        assert_eq!(result, expect);
        assert_eq!(
            read_to_string(".gemlocal")?,
            "on RedCloth /src/RedCloth\noff puma /src/puma\n"
        );

        Ok(())
    }
}
