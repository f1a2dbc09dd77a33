// SPDX-License-Identifier: GPL-2.0-only

//! `pile delete` implementation.

use std::{collections::HashSet, str::FromStr};

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
    name: "delete",
    make,
    run,
};

fn make() -> clap::Command {
    clap::Command::new(STGIT_COMMAND.name)
        .about("Permanently delete patches")
        .arg(
            Arg::new("patchname")
                .help("Patch(es) to delete")
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

    let to_delete: HashSet<PatchName> = matches
        .get_many::<PatchName>("patchname")
        .expect("required")
        .cloned()
        .collect();

    for name in &to_delete {
        if !stack.state.has_patch(name) {
            return Err(Error::UnknownPatch(name.to_string()).into());
        }
    }

    stack
        .setup_transaction()?
        .with_output_stream(Box::new(get_color_stdout(matches)))
        .transact(|trans| trans.delete_patches(|name| to_delete.contains(name)).map(|_| ()))
        .execute("delete")?;

    Ok(())
}
