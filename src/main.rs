// SPDX-License-Identifier: GPL-2.0-only

//! `pile`: a StGit-style patch-queue manager built on `git_repository`
//! (gix) plus a handful of plumbing calls shelled out to `git` where gix
//! does not (yet) cover the operation.

mod argset;
mod cancel;
mod cmd;
mod color;
mod editor;
mod error;
mod ext;
mod git;
mod hook;
mod import;
mod output;
mod parser;
mod patch;
mod stack;
mod stupid;
mod transaction;
mod wrap;

use std::process::ExitCode;

use clap::{ArgMatches, Command};

use error::Error;

fn build_cli() -> Command {
    let mut app = Command::new("pile")
        .about("A patch-queue manager")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true);
    for command in cmd::COMMANDS {
        app = app.subcommand((command.make)());
    }
    app
}

fn dispatch(matches: &ArgMatches) -> anyhow::Result<()> {
    let (name, sub_matches) = matches
        .subcommand()
        .expect("clap enforces subcommand_required");
    let command = cmd::get(name).expect("clap only matches registered subcommands");
    (command.run)(sub_matches)
}

/// Maps a top-level failure onto the process exit-code table: `0` success,
/// `1` user error, `2` internal failure, `3` concurrent-modification
/// detected (see `Error::exit_code`). Errors that never reached the typed
/// [`Error`] enum (I/O failures, git plumbing surprises, etc.) are treated
/// as internal failures.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(known) => known.exit_code(),
        None => 2,
    }
}

fn main() -> ExitCode {
    cancel::install();

    let matches = build_cli().get_matches();
    match dispatch(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("pile: {err:#}");
            ExitCode::from(exit_code_for(&err) as u8)
        }
    }
}
