// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use localctl::{
    command::{CommandError, CommandTable},
    config::Config,
    path::ProjectRoot,
    registry::{Override, Status},
    session::{Error as SessionError, Session},
    settings::MemoryStore,
};

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{
    env::set_current_dir,
    fs::{create_dir_all, read_to_string, write},
    path::Path,
};

pub(crate) struct ProjectFixture {
    table: CommandTable,
    session: Session<MemoryStore>,
}

impl ProjectFixture {
    /// Turn current directory into a project and open a session for it.
    pub(crate) fn new(store: MemoryStore) -> Result<Self> {
        write("Gemfile", "source 'https://rubygems.org'\n")?;
        Self::discover(store)
    }

    /// Open session for whatever project contains the current directory.
    pub(crate) fn discover(store: MemoryStore) -> Result<Self> {
        let root = ProjectRoot::discover_from_cwd(["Gemfile", "gems.rb"])?;

        Ok(Self {
            table: CommandTable::new(),
            session: Session::new(root, Config::default(), store),
        })
    }

    pub(crate) fn try_run(&mut self, name: &str, args: &[&str]) -> Result<String, CommandError> {
        let args = args.iter().map(ToString::to_string).collect::<Vec<_>>();
        let invocation = self.table.parse(name, &args)?;
        let mut out = Vec::new();
        self.table.run(&invocation, &mut self.session, &mut out)?;

        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub(crate) fn run(&mut self, name: &str, args: &[&str]) -> Result<String> {
        Ok(self.try_run(name, args)?)
    }
}

#[sealed_test]
fn add_then_status_reports_override() -> Result<()> {
    let mut project = ProjectFixture::new(MemoryStore::new())?;

    let output = project.run("add", &["foo", "/tmp/foo"])?;
    assert_eq!(output, "added on foo /tmp/foo\n");

    let output = project.run("status", &["foo"])?;
    assert_eq!(output, "on foo /tmp/foo\n");
    assert_eq!(project.session.store().get("local.foo"), Some("/tmp/foo"));

    Ok(())
}

#[sealed_test]
fn remove_then_status_fails_with_not_found() -> Result<()> {
    let mut project = ProjectFixture::new(MemoryStore::new())?;
    project.run("add", &["foo", "/tmp/foo"])?;
    project.run("add", &["bar", "/tmp/bar"])?;

    let output = project.run("rm", &["foo"])?;
    assert_eq!(output, "removed on foo /tmp/foo\n");

    let output = project.run("status", &[])?;
    assert_eq!(output, "on bar /tmp/bar\n");

    let error = project.try_run("show", &["foo"]).unwrap_err();
    assert!(matches!(
        error.session_error(),
        Some(SessionError::NotFound { name }) if name == "foo"
    ));

    // Removing again is not an error.
    let output = project.run("remove", &["foo"])?;
    assert_eq!(output, "nothing to remove for \"foo\"\n");

    Ok(())
}

#[sealed_test]
fn use_without_names_applies_to_every_override() -> Result<()> {
    write(
        ".gemlocal",
        indoc! {r#"
            # hand written
            off bar /src/bar
            off baz /src/baz
            off foo /src/foo
        "#},
    )?;
    let mut project = ProjectFixture::new(MemoryStore::new().fail_on("local.baz"))?;

    let error = project.try_run("use", &[]).unwrap_err();
    assert!(matches!(
        error.session_error(),
        Some(SessionError::Sync { key, .. }) if key == "local.baz"
    ));
    assert!(error.to_string().contains("localctl use"), "{error}");

    // INVARIANT: Failure stops at baz, everything before it stays on.
    let expect = indoc! {r#"
        on bar /src/bar
        off baz /src/baz
        off foo /src/foo
    "#};
    assert_eq!(read_to_string(".gemlocal")?, expect);

    let output = project.run("on", &["foo"])?;
    assert_eq!(output, "on foo /src/foo\n");
    assert_eq!(project.session.store().get("local.foo"), Some("/src/foo"));

    Ok(())
}

#[sealed_test]
fn ignore_turns_overrides_off() -> Result<()> {
    let mut project = ProjectFixture::new(MemoryStore::new())?;
    project.run("add", &["foo", "/tmp/foo"])?;
    project.run("add", &["bar", "/tmp/bar"])?;

    let output = project.run("off", &["foo"])?;
    assert_eq!(output, "off foo /tmp/foo\n");
    assert_eq!(project.session.store().get("local.foo"), None);
    assert_eq!(project.session.store().get("local.bar"), Some("/tmp/bar"));

    let output = project.run("ignore", &[])?;
    assert_eq!(output, "off bar /tmp/bar\noff foo /tmp/foo\n");

    Ok(())
}

#[sealed_test]
fn malformed_registry_file_aborts_command() -> Result<()> {
    write(".gemlocal", "on bar /src/bar\nfoo /src/foo\n")?;
    let mut project = ProjectFixture::new(MemoryStore::new())?;

    let error = anyhow::Error::from(project.try_run("status", &[]).unwrap_err());
    let message = format!("{error:?}");
    assert!(message.contains("line 2"), "{message}");
    assert!(message.contains("foo /src/foo"), "{message}");
    assert!(message.contains("localctl status"), "{message}");

    Ok(())
}

#[sealed_test]
fn rebuild_trusts_settings_store() -> Result<()> {
    write(
        ".gemlocal",
        indoc! {r#"
            on bar /src/bar
            off baz /src/baz
            off foo /src/foo
        "#},
    )?;
    let store = MemoryStore::new()
        .with("local.foo", "/elsewhere/foo")
        .with("local.unregistered", "/src/unregistered")
        .with("path", "vendor/bundle");
    let mut project = ProjectFixture::new(store)?;

    let output = project.run("rebuild", &[])?;
    let expect = indoc! {r#"
        off bar /src/bar
        off baz /src/baz
        on foo /elsewhere/foo
    "#};
    assert_eq!(output, expect);
    assert_eq!(read_to_string(".gemlocal")?, expect);

    let entries = project.session.status(None)?;
    assert_eq!(
        entries.last(),
        Some(&Override::new("foo", "/elsewhere/foo", Status::On))
    );

    Ok(())
}

#[sealed_test]
fn install_appends_ignore_patterns_once() -> Result<()> {
    write(".gitignore", "/vendor\n")?;
    let mut project = ProjectFixture::new(MemoryStore::new())?;

    let output = project.run("install", &[])?;
    assert_eq!(output, "added .gemlocal to .gitignore\nadded .bundle to .gitignore\n");

    let output = project.run("install", &[])?;
    assert_eq!(output, ".gitignore already up to date\n");
    assert_eq!(read_to_string(".gitignore")?, "/vendor\n.gemlocal\n.bundle\n");

    Ok(())
}

#[sealed_test]
fn commands_work_from_nested_directory() -> Result<()> {
    write("gems.rb", "")?;
    create_dir_all("app/models")?;
    set_current_dir("app/models")?;

    let mut project = ProjectFixture::discover(MemoryStore::new())?;
    project.run("add", &["foo", "/tmp/foo"])?;
    assert_eq!(read_to_string("../../.gemlocal")?, "on foo /tmp/foo\n");
    assert!(!Path::new(".gemlocal").exists());

    Ok(())
}

#[sealed_test]
fn help_needs_no_project() -> Result<()> {
    let table = CommandTable::new();
    let invocation = table.parse("help", &["remove".to_string()])?;
    let mut out = Vec::new();
    table.help(&invocation, &mut out)?;

    let expect = indoc! {r#"
        Usage: localctl remove <name>
        Aliases: rm
        Takes exactly 1 argument.

        Forget a local override. Unknown names are ignored.
    "#};
    assert_eq!(String::from_utf8(out)?, expect);

    Ok(())
}
