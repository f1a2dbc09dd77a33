// SPDX-License-Identifier: GPL-2.0-only

//! `pile refresh` implementation.

use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches};

use crate::{
    argset,
    color::get_color_stdout,
    editor,
    ext::RepositoryExtended,
    git::GitBackend,
    hook,
    patch::Signature,
    stack::{InitializationPolicy, Stack},
    stupid::StupidExt,
    wrap::Message,
};

pub(super) const STGIT_COMMAND: super::StGitCommand = super::StGitCommand {
    name: "refresh",
    make,
    run,
};

fn make() -> clap::Command {
    clap::Command::new(STGIT_COMMAND.name)
        .about("Incorporate worktree changes into the current patch")
        .long_about(
            "Regenerate the topmost applied patch's commit from the current index \
             and working tree contents; the old commit is no longer reachable from \
             the stack.",
        )
        .arg(
            Arg::new("index")
                .long("index")
                .short('i')
                .help("Refresh from the index instead of the working tree")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("message")
                .long("message")
                .short('m')
                .help("Replace the patch's description with <message>")
                .value_name("message"),
        )
        .arg(
            Arg::new("edit")
                .long("edit")
                .short('e')
                .help("Edit the patch description before committing")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-verify")
                .long("no-verify")
                .help("Skip the pre-commit and commit-msg hooks")
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

    stack.check_head_top_mismatch()?;

    let target = match stack.state.current() {
        Some(name) => name.clone(),
        None => return Err(anyhow!("no patches applied")),
    };

    let use_index = matches.get_flag("index");
    let no_verify = matches.get_flag("no-verify");
    let want_edit = matches.get_flag("edit");

    if !no_verify {
        hook::run_pre_commit_hook(&repo, want_edit)?;
    }

    if !use_index {
        repo.stupid().update_index_all()?;
    }
    let new_tree = repo.stupid().write_tree()?;

    let current_description = stack.state.get_patch(&target)?.description.clone();
    let current_bottom = stack.state.get_patch(&target)?.bottom;

    let description = if let Some(message) = matches.get_one::<String>("message") {
        message.clone()
    } else if want_edit {
        editor::edit_description(&repo, &current_description, None)?
    } else {
        current_description
    };

    let description = if want_edit {
        hook::run_commit_msg_hook(&repo, Message::from(description), !no_verify)?
            .decode()?
            .into_owned()
    } else {
        description
    };

    let committer_sig = repo.committer_signature()?;

    stack
        .setup_transaction()?
        .with_output_stream(Box::new(get_color_stdout(matches)))
        .transact(|trans| {
            let author = trans.get_patch(&target).author.clone();
            let author_sig = git_repository::actor::Signature {
                name: author.name.into(),
                email: author.email.into(),
                time: git_repository::date::parse(&author.date, None)
                    .unwrap_or_else(|_| git_repository::date::Time::now_local_or_utc()),
            };
            let new_top = repo.commit(
                new_tree,
                &[current_bottom],
                author_sig,
                committer_sig.clone(),
                &description,
            )?;

            trans.refresh_patch(
                &target,
                new_top,
                description.clone(),
                Signature::from_actor(&committer_sig),
            )
        })
        .execute(&format!("refresh {target}"))?;

    Ok(())
}
