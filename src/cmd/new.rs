// SPDX-License-Identifier: GPL-2.0-only

//! `pile new` implementation.

use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches};

use crate::{
    argset,
    color::get_color_stdout,
    editor,
    ext::RepositoryExtended,
    git::GitBackend,
    hook,
    patch::{PatchName, PatchRecord, Signature},
    stack::{InitializationPolicy, Stack},
    wrap::Message,
};

pub(super) const STGIT_COMMAND: super::StGitCommand = super::StGitCommand {
    name: "new",
    make,
    run,
};

fn make() -> clap::Command {
    clap::Command::new(STGIT_COMMAND.name)
        .about("Create a new, empty patch at the top of the stack")
        .long_about(
            "Create a new, initially empty patch on top of the stack. The patch's \
             description is taken from `--message`, or else opened in the configured \
             editor.",
        )
        .arg(
            Arg::new("patchname")
                .help("Name for the new patch")
                .value_name("name")
                .value_parser(PatchName::from_str),
        )
        .arg(
            Arg::new("message")
                .long("message")
                .short('m')
                .help("Use <message> as the patch description")
                .value_name("message"),
        )
        .arg(argset::branch_arg())
        .arg(argset::color_arg())
}

fn run(matches: &ArgMatches) -> Result<()> {
    let repo = git_repository::Repository::open()?;
    let stack = Stack::from_branch(
        &repo,
        argset::get_one_str(matches, "branch"),
        InitializationPolicy::AutoInitialize,
    )?;

    let head = repo.head_id()?;
    let author = repo.author_signature()?;
    let committer = repo.committer_signature()?;

    let (description, used_editor) = match matches.get_one::<String>("message") {
        Some(message) => (message.clone(), false),
        None => (editor::edit_description(&repo, "", None)?, true),
    };
    let description = if used_editor {
        hook::run_commit_msg_hook(&repo, Message::from(description), true)?
            .decode()?
            .into_owned()
    } else {
        description
    };

    let name = match matches.get_one::<PatchName>("patchname") {
        Some(name) => name.clone(),
        None => {
            let limit = PatchName::length_limit(&repo.config_snapshot());
            let subject = description
                .lines()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("patch");
            let taken = |candidate: &str| match PatchName::from_str(candidate) {
                Ok(n) => stack.state.has_patch(&n),
                Err(_) => false,
            };
            PatchName::uniquify(PatchName::sanitize(subject, limit), &taken)
        }
    };

    if stack.state.has_patch(&name) {
        return Err(anyhow!("patch `{name}` already exists"));
    }

    let record = PatchRecord::new(
        head,
        head,
        description,
        Signature::from_actor(&author),
        Signature::from_actor(&committer),
    );

    stack
        .setup_transaction()?
        .with_output_stream(Box::new(get_color_stdout(matches)))
        .transact(|trans| trans.new_applied(&name, record))
        .execute(&format!("new: {name}"))?;

    Ok(())
}
