// SPDX-License-Identifier: GPL-2.0-only

//! `pile rename` implementation.

use std::str::FromStr;

use anyhow::Result;
use clap::{Arg, ArgMatches};

use crate::{
    argset,
    color::get_color_stdout,
    patch::PatchName,
    stack::{InitializationPolicy, Stack},
};

pub(super) const STGIT_COMMAND: super::StGitCommand = super::StGitCommand {
    name: "rename",
    make,
    run,
};

fn make() -> clap::Command {
    clap::Command::new(STGIT_COMMAND.name)
        .about("Rename a patch")
        .arg(
            Arg::new("old-name")
                .help("Patch to rename")
                .value_name("old-name")
                .required(true)
                .value_parser(PatchName::from_str),
        )
        .arg(
            Arg::new("new-name")
                .help("New name")
                .value_name("new-name")
                .required(true)
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

    let old = matches
        .get_one::<PatchName>("old-name")
        .expect("required")
        .clone();
    let new = matches
        .get_one::<PatchName>("new-name")
        .expect("required")
        .clone();

    stack
        .setup_transaction()?
        .with_output_stream(Box::new(get_color_stdout(matches)))
        .transact(|trans| trans.rename_patch(&old, &new))
        .execute("rename")?;

    Ok(())
}
