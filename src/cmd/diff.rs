// SPDX-License-Identifier: GPL-2.0-only

//! `pile diff` implementation.

use std::io::Write;

use anyhow::Result;
use clap::{Arg, ArgMatches, ValueHint};

use crate::{argset, stupid::StupidExt};

pub(super) const STGIT_COMMAND: super::StGitCommand = super::StGitCommand {
    name: "diff",
    make,
    run,
};

fn make() -> clap::Command {
    clap::Command::new(STGIT_COMMAND.name)
        .about("Show a diff")
        .long_about(
            "Show the diff between the working tree (or a given revision) and HEAD.",
        )
        .arg(
            Arg::new("pathspecs")
                .help("Limit diff to files matching path(s)")
                .value_name("path")
                .num_args(0..)
                .value_hint(ValueHint::AnyPath),
        )
        .arg(
            Arg::new("revision")
                .long("rev")
                .short('r')
                .help("Diff against <revision> instead of HEAD")
                .value_name("revision"),
        )
        .arg(
            Arg::new("stat")
                .long("stat")
                .short('s')
                .help("Show the diffstat instead of the diff")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(argset::color_arg())
}

fn run(matches: &ArgMatches) -> Result<()> {
    let repo = git_repository::Repository::open()?;
    let revspec = argset::get_one_str(matches, "revision")
        .unwrap_or("HEAD")
        .to_string();
    let pathspecs: Vec<String> = matches
        .get_many::<String>("pathspecs")
        .unwrap_or_default()
        .cloned()
        .collect();

    let out = repo.stupid().diff(
        &revspec,
        &pathspecs,
        matches.get_flag("stat"),
        crate::color::use_color(matches),
    )?;

    std::io::stdout().write_all(&out)?;
    Ok(())
}
