// SPDX-License-Identifier: GPL-2.0-only

//! `pile branch` implementation: branch-level bookkeeping (currently just
//! protection) that doesn't fit any single patch operation.

use anyhow::Result;
use clap::ArgMatches;

use crate::{
    argset,
    stack::{InitializationPolicy, Stack},
};

pub(super) const STGIT_COMMAND: super::StGitCommand = super::StGitCommand {
    name: "branch",
    make,
    run,
};

fn make() -> clap::Command {
    clap::Command::new(STGIT_COMMAND.name)
        .about("Branch-level bookkeeping")
        .long_about(
            "Protect or unprotect a branch. A protected branch refuses any operation \
             that would delete a patch.",
        )
        .arg(
            clap::Arg::new("protect")
                .long("protect")
                .help("Mark the branch as protected")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with("unprotect"),
        )
        .arg(
            clap::Arg::new("unprotect")
                .long("unprotect")
                .help("Clear the branch's protected flag")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(argset::branch_arg())
}

fn run(matches: &ArgMatches) -> Result<()> {
    let repo = git_repository::Repository::open()?;
    let mut stack = Stack::from_branch(
        &repo,
        argset::get_one_str(matches, "branch"),
        InitializationPolicy::RequireInitialized,
    )?;

    if matches.get_flag("protect") {
        stack.set_protected(true)?;
        println!("Protected branch `{}`", stack.branch_name());
    } else if matches.get_flag("unprotect") {
        stack.set_protected(false)?;
        println!("Unprotected branch `{}`", stack.branch_name());
    } else {
        println!(
            "{}: {}",
            stack.branch_name(),
            if stack.is_protected() {
                "protected"
            } else {
                "unprotected"
            }
        );
    }

    Ok(())
}
