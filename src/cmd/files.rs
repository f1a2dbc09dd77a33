// SPDX-License-Identifier: GPL-2.0-only

//! `pile files` implementation: list the files touched by a patch.

use std::io::Write;
use std::str::FromStr;

use anyhow::Result;
use clap::{Arg, ArgMatches};

use crate::{
    argset,
    error::Error,
    patch::PatchName,
    stack::{InitializationPolicy, Stack},
    stupid::StupidExt,
};

pub(super) const STGIT_COMMAND: super::StGitCommand = super::StGitCommand {
    name: "files",
    make,
    run,
};

fn make() -> clap::Command {
    clap::Command::new(STGIT_COMMAND.name)
        .about("List the files modified by a patch")
        .long_about(
            "List the files modified between a patch's bottom and top trees. \
             Defaults to the topmost applied patch.",
        )
        .arg(
            Arg::new("patchname")
                .help("Patch to inspect")
                .value_name("patch")
                .value_parser(PatchName::from_str),
        )
        .arg(
            Arg::new("bare")
                .long("bare")
                .help("Print only the file names, without status letters")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with("stat"),
        )
        .arg(
            Arg::new("stat")
                .long("stat")
                .help("Show the diffstat instead of a file listing")
                .action(clap::ArgAction::SetTrue),
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

    let name = match matches.get_one::<PatchName>("patchname") {
        Some(name) => name.clone(),
        None => stack
            .state
            .current()
            .cloned()
            .ok_or_else(|| Error::StackInvariantWouldBreak("no patch is applied".to_string()))?,
    };
    let record = stack.state.get_patch(&name)?;

    let out = repo.stupid().diff_tree_files_status(
        record.bottom,
        record.top,
        matches.get_flag("stat"),
        matches.get_flag("bare"),
        crate::color::use_color(matches),
    )?;

    std::io::stdout().write_all(&out)?;
    Ok(())
}
