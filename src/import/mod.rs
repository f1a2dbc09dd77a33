// SPDX-License-Identifier: GPL-2.0-only

//! Orchestrates [`crate::parser`] output through a [`crate::transaction`],
//! turning parsed patches into applied commits.

use git_repository::ObjectId;

use anyhow::{Context, Result};

use crate::{
    editor,
    error::Error,
    ext::RepositoryExtended,
    git::{failed_patch_path, GitBackend},
    hook,
    parser::{self, ParsedPatch},
    patch::{PatchName, PatchRecord, Signature},
    stack::Stack,
    stupid::StupidExt,
    transaction::ConflictMode,
    wrap::Message,
};

/// Recognized import options (§9: "a single `ImportOptions` value with the
/// recognized options enumerated").
#[derive(Debug, Default, Clone)]
pub(crate) struct ImportOptions {
    pub(crate) name: Option<String>,
    pub(crate) stripname: bool,
    pub(crate) ignore: bool,
    pub(crate) replace: bool,
    pub(crate) reject: bool,
    pub(crate) sign_trailer: Option<String>,
    /// Open each patch's description in the configured editor before
    /// committing; also runs the `commit-msg` hook on the result.
    pub(crate) edit: bool,
    pub(crate) no_verify: bool,
}

/// Parses and applies `source` (the raw bytes of an import target) onto
/// `stack`, returning the stack reflecting the newly applied patch(es).
pub(crate) fn import<'repo>(
    repo: &'repo git_repository::Repository,
    stack: Stack<'repo>,
    bytes: &[u8],
    source_name: Option<&str>,
    hint: Option<parser::Hint>,
    options: &ImportOptions,
) -> Result<Stack<'repo>> {
    let hint = match hint {
        Some(hint) => hint,
        None => parser::detect_hint(bytes, source_name)?,
    };
    let parsed = parser::parse(repo, bytes, source_name, hint)?;
    import_parsed(repo, stack, parsed, options)
}

/// Like [`import`] but operating on already-parsed patches, e.g. from a
/// series or tar source that yields several at once.
pub(crate) fn import_parsed<'repo>(
    repo: &'repo git_repository::Repository,
    stack: Stack<'repo>,
    parsed: Vec<ParsedPatch>,
    options: &ImportOptions,
) -> Result<Stack<'repo>> {
    if parsed.is_empty() {
        return Ok(stack);
    }

    let config = repo.config_snapshot();
    let limit = PatchName::length_limit(&config);
    let committer = repo.committer_signature().ok();

    let reflog_msg = format!("import: {} patch(es)", parsed.len());

    let execute_ctx = stack.setup_transaction()?.conflict_mode(ConflictMode::Allow).transact(
        |trans| {
            for entry in &parsed {
                crate::cancel::check()?;

                let name = parser::derive_name(
                    options.name.as_deref(),
                    entry,
                    options.stripname,
                    limit,
                    &|candidate| trans.has_patch_str(candidate),
                )?;

                if options.ignore && trans.has_patch(&name) {
                    continue;
                }

                if options.replace && trans.has_patch(&name) {
                    trans.delete_patches(|n| n == &name)?;
                }

                let current_top = trans.top();
                let parent_tree = repo.read_commit(current_top)?.tree_id()?.detach();

                let new_tree = apply_onto(repo, parent_tree, &entry.diff, entry.strip, options.reject)?;

                let author_sig = if entry.author.name.is_empty() {
                    repo.author_signature()?
                } else {
                    git_repository::actor::Signature {
                        name: entry.author.name.clone().into(),
                        email: entry.author.email.clone().into(),
                        time: git_repository::date::parse(&entry.author.date, None)
                            .unwrap_or_else(|_| git_repository::date::Time::now_local_or_utc()),
                    }
                };
                let committer_sig = committer.clone().unwrap_or_else(|| author_sig.clone());

                let description = if options.edit {
                    editor::edit_description(repo, &entry.description, Some(&entry.diff))?
                } else {
                    entry.description.clone()
                };
                let message = build_message(repo, &description, options.sign_trailer.as_deref(), &author_sig)?;
                let message = if options.edit {
                    let edited = hook::run_commit_msg_hook(
                        repo,
                        Message::from(message),
                        !options.no_verify,
                    )?;
                    edited.decode()?.into_owned()
                } else {
                    message
                };

                let new_top = repo.commit(
                    new_tree,
                    &[current_top],
                    author_sig.clone(),
                    committer_sig.clone(),
                    &message,
                )?;

                let record = PatchRecord::new(
                    current_top,
                    new_top,
                    message,
                    Signature::from_actor(&author_sig),
                    Signature::from_actor(&committer_sig),
                );
                trans.new_applied(&name, record)?;
            }
            Ok(())
        },
    );

    execute_ctx.execute(&reflog_msg)
}

/// Applies `diff` (at strip level `strip`) onto `parent_tree` using a
/// scratch index, returning the resulting tree. On failure without
/// `--reject`, records the diff to `.pile-failed.patch` and returns
/// `parent_tree` unchanged (an empty patch); with `--reject`, `.rej` files
/// are left in the work tree and the partially-applied tree is returned.
fn apply_onto(
    repo: &git_repository::Repository,
    parent_tree: ObjectId,
    diff: &[u8],
    strip: u32,
    reject: bool,
) -> Result<ObjectId> {
    let stupid = repo.stupid();
    stupid.with_temp_index(|scratch| {
        scratch.read_tree(parent_tree)?;
        match scratch.apply(diff, strip, reject, true)? {
            Ok(()) => scratch.write_tree(),
            Err(_rejects) if reject => scratch.write_tree(),
            Err(_) => {
                if let Some(work_dir) = repo.work_dir() {
                    std::fs::write(failed_patch_path(work_dir), diff)
                        .context("writing .pile-failed.patch")?;
                }
                Ok(parent_tree)
            }
        }
    })
}

fn build_message(
    repo: &git_repository::Repository,
    description: &str,
    sign_trailer: Option<&str>,
    author: &git_repository::actor::Signature,
) -> Result<String> {
    match sign_trailer {
        None => Ok(description.to_string()),
        Some(trailer) => {
            let value = format!("{} <{}>", author.name, author.email);
            let out = repo
                .stupid()
                .interpret_trailers(description.as_bytes(), std::iter::once((trailer, value.as_str())))?;
            Ok(String::from_utf8_lossy(&out).into_owned())
        }
    }
}
