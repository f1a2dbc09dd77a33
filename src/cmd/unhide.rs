// SPDX-License-Identifier: GPL-2.0-only

//! `pile unhide` implementation.

use std::str::FromStr;

use anyhow::Result;
use clap::{Arg, ArgMatches};

use crate::{
    argset,
    color::get_color_stdout,
    error::Error,
    patch::PatchName,
    stack::{InitializationPolicy, Stack},
};

pub(super) const STGIT_COMMAND: super::StGitCommand = super::StGitCommand {
    name: "unhide",
    make,
    run,
};

fn make() -> clap::Command {
    clap::Command::new(STGIT_COMMAND.name)
        .about("Unhide previously hidden patches")
        .arg(
            Arg::new("patchname")
                .help("Patch(es) to unhide")
                .value_name("patch")
                .required(true)
                .num_args(1..)
                .value_parser(PatchName::from_str),
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

    let names: Vec<PatchName> = matches
        .get_many::<PatchName>("patchname")
        .expect("required")
        .cloned()
        .collect();

    for name in &names {
        if !stack.state.is_hidden(name) {
            return Err(Error::UnknownPatch(name.to_string()).into());
        }
    }

    stack
        .setup_transaction()?
        .with_output_stream(Box::new(get_color_stdout(matches)))
        .transact(|trans| trans.unhide_patches(&names))
        .execute("unhide")?;

    Ok(())
}
