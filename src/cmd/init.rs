// SPDX-License-Identifier: GPL-2.0-only

//! `pile init` implementation.

use anyhow::Result;
use clap::ArgMatches;

use crate::{
    argset,
    stack::{InitializationPolicy, Stack},
};

pub(super) const STGIT_COMMAND: super::StGitCommand = super::StGitCommand {
    name: "init",
    make,
    run,
};

fn make() -> clap::Command {
    clap::Command::new(STGIT_COMMAND.name)
        .about("Initialize a branch for use with pile")
        .long_about(
            "Initialize the current branch (or the one given with `--branch`) for \
             patch management: creates the `patches/<branch>` bookkeeping directory \
             and the `refs/bases/<branch>` ref pointing at the branch's current HEAD.",
        )
        .arg(argset::branch_arg())
}

fn run(matches: &ArgMatches) -> Result<()> {
    let repo = git_repository::Repository::open()?;
    let stack = Stack::from_branch(
        &repo,
        argset::get_one_str(matches, "branch"),
        InitializationPolicy::MustInitialize,
    )?;
    println!("Initialized branch `{}`", stack.branch_name());
    Ok(())
}
