// SPDX-License-Identifier: GPL-2.0-only

//! `pile series` implementation: prints the patch stack, quilt-series style.

use std::io::Write;

use anyhow::Result;
use clap::ArgMatches;
use termcolor::{Color, ColorSpec, WriteColor};

use crate::{
    argset,
    color::get_color_stdout,
    patch::PatchName,
    stack::{InitializationPolicy, Stack},
};

pub(super) const STGIT_COMMAND: super::StGitCommand = super::StGitCommand {
    name: "series",
    make,
    run,
};

fn make() -> clap::Command {
    clap::Command::new(STGIT_COMMAND.name)
        .about("Print the patch series")
        .long_about(
            "Print the patch series: applied patches marked with `+` (the topmost \
             with `>`), unapplied patches with `-`, and hidden patches (with \
             `--hidden`) with `!`.",
        )
        .arg(argset::branch_arg())
        .arg(argset::color_arg())
        .arg(
            clap::Arg::new("hidden")
                .long("hidden")
                .help("Also list hidden patches")
                .action(clap::ArgAction::SetTrue),
        )
}

fn run(matches: &ArgMatches) -> Result<()> {
    let repo = git_repository::Repository::open()?;
    let stack = Stack::from_branch(
        &repo,
        argset::get_one_str(matches, "branch"),
        InitializationPolicy::AllowUninitialized,
    )?;

    let mut stream = get_color_stdout(matches);
    let current = stack.state.current().cloned();

    for name in &stack.state.applied {
        print_entry(&mut stream, name, if Some(name) == current.as_ref() { '>' } else { '+' }, Color::Green)?;
    }
    for name in &stack.state.unapplied {
        print_entry(&mut stream, name, '-', Color::Red)?;
    }
    if matches.get_flag("hidden") {
        for name in &stack.state.hidden {
            print_entry(&mut stream, name, '!', Color::Black)?;
        }
    }

    Ok(())
}

fn print_entry(
    stream: &mut termcolor::StandardStream,
    name: &PatchName,
    symbol: char,
    color: Color,
) -> Result<()> {
    stream.set_color(ColorSpec::new().set_fg(Some(color)))?;
    write!(stream, "{symbol} ")?;
    stream.reset()?;
    writeln!(stream, "{name}")?;
    Ok(())
}
