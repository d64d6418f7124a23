// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Command table and dispatch.
//!
//! Every localctl command is described once in [`COMMANDS`]: its canonical
//! name, aliases, usage line, description, and how many arguments it takes.
//! [`CommandTable`] resolves aliases up front, checks arity, and hands the
//! arguments to the matching [`Session`] operation. Help text is generated
//! from the same table.

use crate::{
    registry::Override,
    session::{Error as SessionError, Session},
    settings::SettingsStore,
};

use std::{
    collections::HashMap,
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
    io::Write,
};

/// Every command localctl understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Add,
    Status,
    Remove,
    Use,
    Ignore,
    Toggle,
    Rebuild,
    Install,
    Help,
}

/// Number of positional arguments a command accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtMost(usize),
    Any,
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exactly(expect) => count == expect,
            Self::AtMost(max) => count <= max,
            Self::Any => true,
        }
    }
}

impl Display for Arity {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Exactly(0) => fmt.write_str("no arguments"),
            Self::Exactly(1) => fmt.write_str("exactly 1 argument"),
            Self::Exactly(expect) => write!(fmt, "exactly {expect} arguments"),
            Self::AtMost(1) => fmt.write_str("at most 1 argument"),
            Self::AtMost(max) => write!(fmt, "at most {max} arguments"),
            Self::Any => fmt.write_str("any number of arguments"),
        }
    }
}

/// Metadata of a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub kind: CommandKind,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub description: &'static str,
    pub arity: Arity,
}

/// Command definitions, in help order.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        kind: CommandKind::Add,
        name: "add",
        aliases: &[],
        usage: "localctl add <name> <location>",
        description: "Register a local override for a gem and turn it on.",
        arity: Arity::Exactly(2),
    },
    CommandSpec {
        kind: CommandKind::Status,
        name: "status",
        aliases: &["show"],
        usage: "localctl status [<name>]",
        description: "Show every local override, or just the named one.",
        arity: Arity::AtMost(1),
    },
    CommandSpec {
        kind: CommandKind::Remove,
        name: "remove",
        aliases: &["rm"],
        usage: "localctl remove <name>",
        description: "Forget a local override. Unknown names are ignored.",
        arity: Arity::Exactly(1),
    },
    CommandSpec {
        kind: CommandKind::Use,
        name: "use",
        aliases: &["on"],
        usage: "localctl use [<name>]...",
        description: "Turn local overrides on, all of them when no name is given.",
        arity: Arity::Any,
    },
    CommandSpec {
        kind: CommandKind::Ignore,
        name: "ignore",
        aliases: &["off"],
        usage: "localctl ignore [<name>]...",
        description: "Turn local overrides off, all of them when no name is given.",
        arity: Arity::Any,
    },
    CommandSpec {
        kind: CommandKind::Toggle,
        name: "toggle",
        aliases: &[],
        usage: "localctl toggle [<name>]...",
        description: "Flip local overrides between on and off.",
        arity: Arity::Any,
    },
    CommandSpec {
        kind: CommandKind::Rebuild,
        name: "rebuild",
        aliases: &[],
        usage: "localctl rebuild",
        description: "Rebuild the registry file from bundler's current settings.",
        arity: Arity::Exactly(0),
    },
    CommandSpec {
        kind: CommandKind::Install,
        name: "install",
        aliases: &[],
        usage: "localctl install",
        description: "Add the registry file and .bundle to the project's ignore file.",
        arity: Arity::Exactly(0),
    },
    CommandSpec {
        kind: CommandKind::Help,
        name: "help",
        aliases: &[],
        usage: "localctl help [<command>]",
        description: "Show help for all commands, or just one.",
        arity: Arity::AtMost(1),
    },
];

/// A resolved command with arity-checked arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub spec: &'static CommandSpec,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn kind(&self) -> CommandKind {
        self.spec.kind
    }
}

/// Name and alias lookup for [`COMMANDS`].
#[derive(Debug, Clone)]
pub struct CommandTable {
    lookup: HashMap<&'static str, &'static CommandSpec>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTable {
    /// Construct new command table.
    ///
    /// Canonical names and aliases map straight to their command.
    pub fn new() -> Self {
        let mut lookup = HashMap::new();
        for spec in COMMANDS {
            lookup.insert(spec.name, spec);
            for alias in spec.aliases {
                lookup.insert(*alias, spec);
            }
        }

        Self { lookup }
    }

    /// Find command by name or alias.
    ///
    /// # Errors
    ///
    /// - Return [`CommandError::Unknown`] if no command goes by that name.
    pub fn lookup(&self, name: &str) -> Result<&'static CommandSpec> {
        self.lookup
            .get(name)
            .copied()
            .ok_or_else(|| CommandError::Unknown {
                name: name.to_string(),
                valid: COMMANDS
                    .iter()
                    .map(|spec| spec.name)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Resolve command and check its arity.
    ///
    /// # Errors
    ///
    /// - Return [`CommandError::Unknown`] if no command goes by that name.
    /// - Return [`CommandError::Failed`] with a validation error if the
    ///   number of arguments is wrong.
    pub fn parse(&self, name: &str, args: &[String]) -> Result<Invocation> {
        let spec = self.lookup(name)?;
        if !spec.arity.accepts(args.len()) {
            let reason = format!("`{}` takes {}, got {}", spec.name, spec.arity, args.len());
            return Err(CommandError::failed(spec, SessionError::invalid(reason)));
        }

        Ok(Invocation {
            spec,
            args: args.to_vec(),
        })
    }

    /// Run invocation against session, writing its output to `out`.
    ///
    /// # Errors
    ///
    /// - Return [`CommandError::Failed`] if the operation fails.
    /// - Return [`CommandError::Output`] if output cannot be written.
    pub fn run<S, W>(
        &self,
        invocation: &Invocation,
        session: &mut Session<S>,
        out: &mut W,
    ) -> Result<()>
    where
        S: SettingsStore,
        W: Write,
    {
        let spec = invocation.spec;
        let args = invocation.args.as_slice();
        let failed = |error| CommandError::failed(spec, error);

        match spec.kind {
            CommandKind::Add => {
                let entry = session.add(&args[0], &args[1]).map_err(failed)?;
                writeln!(out, "added {entry}")?;
            }
            CommandKind::Status => {
                let entries = session
                    .status(args.first().map(String::as_str))
                    .map_err(failed)?;
                if entries.is_empty() {
                    writeln!(out, "no local overrides registered")?;
                }
                write_entries(out, &entries)?;
            }
            CommandKind::Remove => match session.remove(&args[0]).map_err(failed)? {
                Some(entry) => writeln!(out, "removed {entry}")?,
                None => writeln!(out, "nothing to remove for {:?}", args[0])?,
            },
            CommandKind::Use => {
                let entries = session.enable(args).map_err(failed)?;
                write_entries(out, &entries)?;
            }
            CommandKind::Ignore => {
                let entries = session.disable(args).map_err(failed)?;
                write_entries(out, &entries)?;
            }
            CommandKind::Toggle => {
                let entries = session.toggle(args).map_err(failed)?;
                write_entries(out, &entries)?;
            }
            CommandKind::Rebuild => {
                let entries = session.rebuild().map_err(failed)?;
                write_entries(out, &entries)?;
            }
            CommandKind::Install => {
                let appended = session.install().map_err(failed)?;
                let ignore_file = session.ignore_file().display().to_string();
                if appended.is_empty() {
                    writeln!(out, "{ignore_file} already up to date")?;
                }
                for pattern in appended {
                    writeln!(out, "added {pattern} to {ignore_file}")?;
                }
            }
            CommandKind::Help => self.help(invocation, out)?,
        }

        Ok(())
    }

    /// Write help text for invocation of the help command.
    ///
    /// # Errors
    ///
    /// - Return [`CommandError::Unknown`] if help is asked for an unknown
    ///   command.
    /// - Return [`CommandError::Output`] if output cannot be written.
    pub fn help(&self, invocation: &Invocation, out: &mut impl Write) -> Result<()> {
        match invocation.args.first() {
            Some(name) => out.write_all(self.command_help(name)?.as_bytes())?,
            None => out.write_all(self.overview().as_bytes())?,
        }

        Ok(())
    }

    /// Help overview of every command.
    pub fn overview(&self) -> String {
        let mut text = String::from(
            "Toggle bundler's local gem overrides for this project.\n\n\
             Usage: localctl <command> [<args>...]\n\nCommands:\n",
        );

        let labels = COMMANDS
            .iter()
            .map(|spec| {
                let mut names = vec![spec.name];
                names.extend(spec.aliases.iter().copied());
                (names.join(", "), spec.description)
            })
            .collect::<Vec<_>>();
        let width = labels.iter().map(|(label, _)| label.len()).max().unwrap_or(0);

        for (label, description) in labels {
            text.push_str(&format!("  {label:<width$}  {description}\n"));
        }

        text.push_str("\nRun `localctl help <command>` for details on one command.\n");
        text
    }

    /// Help text of a single command.
    ///
    /// # Errors
    ///
    /// - Return [`CommandError::Unknown`] if no command goes by that name.
    pub fn command_help(&self, name: &str) -> Result<String> {
        let spec = self.lookup(name)?;
        let mut text = format!("Usage: {}\n", spec.usage);
        if !spec.aliases.is_empty() {
            text.push_str(&format!("Aliases: {}\n", spec.aliases.join(", ")));
        }
        text.push_str(&format!("Takes {}.\n\n{}\n", spec.arity, spec.description));

        Ok(text)
    }
}

fn write_entries(out: &mut impl Write, entries: &[Override]) -> std::io::Result<()> {
    for entry in entries {
        writeln!(out, "{entry}")?;
    }

    Ok(())
}

/// Command dispatch error types.
#[derive(Debug)]
pub enum CommandError {
    /// No command goes by the given name.
    Unknown { name: String, valid: String },

    /// Command was found but failed.
    Failed {
        usage: &'static str,
        error: SessionError,
    },

    /// Command output cannot be written.
    Output(std::io::Error),
}

impl CommandError {
    fn failed(spec: &CommandSpec, error: SessionError) -> Self {
        Self::Failed {
            usage: spec.usage,
            error,
        }
    }

    /// Session error behind a failed command.
    pub fn session_error(&self) -> Option<&SessionError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl Display for CommandError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Unknown { name, valid } => write!(
                fmt,
                "unknown command {name:?}, expected one of: {valid}\n\nUsage: localctl <command> [<args>...]"
            ),
            Self::Failed { usage, error } => write!(fmt, "{error}\n\nUsage: {usage}"),
            Self::Output(_) => fmt.write_str("failed to write command output"),
        }
    }
}

// INVARIANT: A failed command already shows its session error, so the source
// chain starts below it.
impl StdError for CommandError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Unknown { .. } => None,
            Self::Failed { error, .. } => error.source(),
            Self::Output(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for CommandError {
    fn from(err: std::io::Error) -> Self {
        Self::Output(err)
    }
}

/// Friendly result alias :3
pub type Result<T, E = CommandError> = std::result::Result<T, E>;
