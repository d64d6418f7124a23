// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use localctl::{
    command::{CommandKind, CommandTable},
    config::Config,
    path::default_config_file,
    session::Session,
};

use anyhow::Result;
use clap::Parser;
use std::{io::stdout, path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Toggle bundler's local gem overrides for this project.
#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "localctl <command> [<args>...]",
    disable_help_subcommand = true,
    version
)]
struct Cli {
    /// Command to run, see `localctl help`.
    #[arg(value_name = "command")]
    pub command: Option<String>,

    /// Arguments passed to command.
    #[arg(value_name = "args", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    fn run(self) -> Result<()> {
        let table = CommandTable::new();
        let name = self.command.unwrap_or_else(|| "help".into());
        let invocation = table.parse(&name, &self.args)?;
        let mut out = stdout().lock();

        if invocation.kind() == CommandKind::Help {
            table.help(&invocation, &mut out)?;
            return Ok(());
        }

        let mut session = Session::open(load_config()?)?;
        table.run(&invocation, &mut session, &mut out)?;

        Ok(())
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn load_config() -> Result<Config> {
    let path = match std::env::var_os("LOCALCTL_CONFIG") {
        Some(path) => PathBuf::from(path),
        None => default_config_file()?,
    };

    Ok(Config::load(path)?)
}
