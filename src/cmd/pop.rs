// SPDX-License-Identifier: GPL-2.0-only

//! `pile pop` implementation.

use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches};

use crate::{
    argset,
    color::get_color_stdout,
    error::Error,
    patch::PatchName,
    stack::{InitializationPolicy, Stack},
};

pub(super) const STGIT_COMMAND: super::StGitCommand = super::StGitCommand {
    name: "pop",
    make,
    run,
};

fn make() -> clap::Command {
    clap::Command::new(STGIT_COMMAND.name)
        .about("Pop patches off the stack")
        .long_about(
            "Pop one or more patches off the top of the stack back onto `unapplied`. \
             Given a patch name, pops that patch and everything above it. Without \
             arguments, pops just the current (topmost) patch.",
        )
        .arg(
            Arg::new("patchname")
                .help("Pop up to and including this patch")
                .value_name("patch")
                .value_parser(PatchName::from_str),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .short('a')
                .help("Pop all applied patches")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with("patchname"),
        )
        .arg(argset::branch_arg())
        .arg(argset::color_arg())
}

fn run(matches: &ArgMatches) -> Result<()> {
    let repo = git_repository::Repository::open()?;
    let stack = Stack::from_branch(
        &repo,
        argset::get_one_str(matches, "branch"),
        InitializationPolicy::RequireInitialized,
    )?;

    let target = if matches.get_flag("all") {
        stack.state.applied.first().cloned()
    } else if let Some(name) = matches.get_one::<PatchName>("patchname") {
        if !stack.state.is_applied(name) {
            return Err(Error::UnknownPatch(name.to_string()).into());
        }
        Some(name.clone())
    } else {
        stack.state.current().cloned()
    };

    let target = match target {
        Some(target) => target,
        None => return Err(anyhow!("no patches applied")),
    };

    stack
        .setup_transaction()?
        .with_output_stream(Box::new(get_color_stdout(matches)))
        .transact(|trans| trans.pop_patches(|name| name == &target).map(|_| ()))
        .execute("pop")?;

    Ok(())
}
