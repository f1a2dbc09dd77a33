// SPDX-License-Identifier: GPL-2.0-only

//! `pile push` implementation.

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
    name: "push",
    make,
    run,
};

fn make() -> clap::Command {
    clap::Command::new(STGIT_COMMAND.name)
        .about("Push patches onto the stack")
        .long_about(
            "Push one or more patches from `unapplied` onto the top of the stack, \
             merging each onto the new top in turn. Without a patch name, pushes the \
             next unapplied patch.",
        )
        .arg(
            Arg::new("patchname")
                .help("Patch(es) to push")
                .value_name("patch")
                .num_args(0..)
                .value_parser(PatchName::from_str),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .short('a')
                .help("Push all unapplied patches")
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

    let to_push: Vec<PatchName> = if matches.get_flag("all") {
        stack.state.unapplied.clone()
    } else if let Some(names) = matches.get_many::<PatchName>("patchname") {
        let names: Vec<PatchName> = names.cloned().collect();
        for name in &names {
            if !stack.state.is_unapplied(name) {
                return Err(Error::UnknownPatch(name.to_string()).into());
            }
        }
        names
    } else {
        match stack.state.unapplied.first() {
            Some(name) => vec![name.clone()],
            None => return Err(anyhow!("no patches to push")),
        }
    };

    if to_push.is_empty() {
        return Err(anyhow!("no patches to push"));
    }

    stack
        .setup_transaction()?
        .with_output_stream(Box::new(get_color_stdout(matches)))
        .transact(|trans| trans.push_patches(&to_push, true))
        .execute("push")?;

    Ok(())
}
