// SPDX-License-Identifier: GPL-2.0-only

//! Modify the StGit stack state atomically.
//!
//! Modifying the stack typically involves a sequence of fallible operations
//! where each step depends on the previous one succeeding. A
//! [`StackTransaction`] stages these operations in memory; nothing is
//! written to disk or to refs until [`ExecuteContext::execute`] commits the
//! result (or a conflict halts the transaction, see below).
//!
//! ```no_run
//! # fn example<'repo>(stack: crate::stack::Stack<'repo>) -> anyhow::Result<()> {
//! stack
//!     .setup_transaction()?
//!     .transact(|trans| {
//!         // stage operations against `trans`
//!         Ok(())
//!     })
//!     .execute("reflog message")?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod options;
mod ui;

use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use git_repository::ObjectId;
use indexmap::IndexSet;

pub(crate) use builder::TransactionBuilder;
pub(crate) use options::ConflictMode;
use options::TransactionOptions;
use ui::TransactionUserInterface;

use crate::{
    error::Error,
    ext::RepositoryExtended,
    git::{failed_patch_path, GitBackend},
    patch::{PatchName, PatchRecord},
    stack::{state, Stack, StackState},
    stupid::StupidExt,
};

/// Status of a pushed patch, both for control flow (conflicts halt the
/// transaction) and to fine-tune the user-facing push report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushStatus {
    New,
    AlreadyMerged,
    Conflict,
    Empty,
    Modified,
    Unmodified,
}

pub(crate) struct StackTransaction<'repo> {
    stack: Stack<'repo>,
    ui: TransactionUserInterface,
    options: TransactionOptions,
    /// Held for the transaction's entire lifetime; released on drop
    /// regardless of whether it commits, halts, or is abandoned.
    _lock: crate::stack::StackLock,

    applied: Vec<PatchName>,
    unapplied: Vec<PatchName>,
    hidden: Vec<PatchName>,
    updated_patches: BTreeMap<PatchName, Option<PatchRecord>>,
    updated_head: Option<ObjectId>,
    updated_base: Option<ObjectId>,

    /// Tree currently reflected by the real index/worktree, tracked so a run
    /// of several pushes only checks out what actually changed.
    current_tree_id: Option<ObjectId>,

    /// Set when a staging operation wants the transaction to stop issuing
    /// further operations. `Error::MergeConflict` is a "soft" halt: the
    /// state staged so far (including the conflicting patch, left empty) is
    /// still committed. Any other error aborts the whole transaction.
    halt: Option<anyhow::Error>,
}

pub(crate) struct ExecuteContext<'repo>(StackTransaction<'repo>);

impl<'repo> ExecuteContext<'repo> {
    /// Finalizes the transaction: validates invariants, checks out the new
    /// top (unless disabled), and persists the on-disk state. On success
    /// returns a fresh [`Stack`] reflecting the committed state.
    pub(crate) fn execute(self, reflog_msg: &str) -> Result<Stack<'repo>> {
        let mut transaction = self.0;

        crate::cancel::check()?;

        let has_conflicts = match transaction.halt.take() {
            Some(err) => match err.downcast_ref::<Error>() {
                Some(Error::MergeConflict { .. }) => true,
                _ => return Err(err),
            },
            None => false,
        };

        let deletes_anything = transaction
            .updated_patches
            .values()
            .any(|maybe_record| maybe_record.is_none());
        if let Some(err) = protection_violation(
            transaction.stack.state.protected,
            &transaction.stack.state.branch,
            deletes_anything,
        ) {
            return Err(err.into());
        }

        let repo = transaction.stack.repo;

        let on_disk = state::load(repo, &transaction.stack.state.branch)
            .map_err(|e| Error::StackWriteFailed {
                step: "re-read stack state for concurrency check".to_string(),
                detail: e.to_string(),
            })?;
        let on_disk_digest = on_disk.as_ref().map(StackState::digest);
        if on_disk_digest != Some(transaction.stack.snapshot_digest) {
            return Err(Error::ConcurrentStackMutation.into());
        }

        let new_top = transaction.head();

        if transaction.options.set_head {
            if transaction.options.use_index_and_worktree {
                checkout(repo, &transaction, new_top)?;
            }
        }

        let mut state = StackState {
            branch: transaction.stack.state.branch.clone(),
            base: transaction.updated_base.unwrap_or(transaction.stack.state.base),
            applied: transaction.applied,
            unapplied: transaction.unapplied,
            hidden: transaction.hidden,
            patches: transaction.stack.state.patches.clone(),
            description: transaction.stack.state.description.clone(),
            protected: transaction.stack.state.protected,
        };

        let mut touched = HashSet::new();
        let mut removed = Vec::new();
        for (name, maybe_record) in transaction.updated_patches {
            match maybe_record {
                Some(record) => {
                    state.patches.insert(name.clone(), record);
                    touched.insert(name);
                }
                None => {
                    state.patches.remove(&name);
                    removed.push(name);
                }
            }
        }

        state.assert_invariants();

        state::save(repo, &state, &touched, &removed).map_err(|e| {
            Error::StackWriteFailed {
                step: "persist stack state".to_string(),
                detail: e.to_string(),
            }
        })?;

        let new_stack = Stack::rebuild(repo, state);

        if has_conflicts {
            let _ = reflog_msg;
            Err(Error::MergeConflict {
                patchname: new_stack
                    .state
                    .current()
                    .map(|n| n.to_string())
                    .unwrap_or_default(),
                conflicts: Vec::new(),
            }
            .into())
        } else {
            Ok(new_stack)
        }
    }
}

fn checkout(
    repo: &git_repository::Repository,
    transaction: &StackTransaction<'_>,
    new_top: ObjectId,
) -> Result<()> {
    if !transaction.options.allow_bad_head {
        transaction.stack.check_head_top_mismatch()?;
    }

    let current_tree = transaction.current_tree_id;
    let new_tree = repo.read_commit(new_top)?.tree_id()?.detach();

    if current_tree == Some(new_tree) && !transaction.options.discard_changes {
        match transaction.options.conflict_mode {
            ConflictMode::Allow => Ok(()),
            ConflictMode::AllowIfSameTop => Ok(()),
            ConflictMode::Disallow => {
                if repo.is_worktree_clean()? {
                    Ok(())
                } else {
                    Err(Error::LocalChanges("index or worktree is dirty".to_string()).into())
                }
            }
        }
    } else {
        repo.switch(new_top)
    }
}

impl<'repo> StackTransaction<'repo> {
    pub(crate) fn stack(&self) -> &Stack<'repo> {
        &self.stack
    }

    pub(crate) fn repo(&self) -> &'repo git_repository::Repository {
        self.stack.repo
    }

    pub(crate) fn applied(&self) -> &[PatchName] {
        &self.applied
    }

    pub(crate) fn unapplied(&self) -> &[PatchName] {
        &self.unapplied
    }

    pub(crate) fn hidden(&self) -> &[PatchName] {
        &self.hidden
    }

    pub(crate) fn all_patches(&self) -> impl Iterator<Item = &PatchName> {
        self.applied
            .iter()
            .chain(self.unapplied.iter())
            .chain(self.hidden.iter())
    }

    pub(crate) fn has_patch(&self, name: &PatchName) -> bool {
        match self.updated_patches.get(name) {
            Some(maybe) => maybe.is_some(),
            None => self.stack.state.has_patch(name),
        }
    }

    /// Like [`has_patch`](Self::has_patch) but usable from contexts (such
    /// as name uniquification) that only have a candidate `&str`, not yet a
    /// validated [`PatchName`].
    pub(crate) fn has_patch_str(&self, name: &str) -> bool {
        match name.parse::<PatchName>() {
            Ok(name) => self.has_patch(&name),
            Err(_) => false,
        }
    }

    pub(crate) fn get_patch(&self, name: &PatchName) -> &PatchRecord {
        if let Some(maybe) = self.updated_patches.get(name) {
            maybe.as_ref().expect("should not access a deleted patch")
        } else {
            self.stack
                .state
                .patches
                .get(name)
                .expect("patch name staged for an operation must exist")
        }
    }

    pub(crate) fn top(&self) -> ObjectId {
        match self.applied.last() {
            Some(name) => self.get_patch(name).top,
            None => self.base(),
        }
    }

    pub(crate) fn head(&self) -> ObjectId {
        self.updated_head.unwrap_or_else(|| self.top())
    }

    pub(crate) fn base(&self) -> ObjectId {
        self.updated_base.unwrap_or(self.stack.state.base)
    }

    fn tree_of(&self, id: ObjectId) -> Result<ObjectId> {
        Ok(self.repo().read_commit(id)?.tree_id()?.detach())
    }

    pub(crate) fn update_patch(&mut self, name: &PatchName, new_top: ObjectId) -> Result<()> {
        let mut record = self.get_patch(name).clone();
        record.rebound(record.bottom, new_top);
        self.updated_patches.insert(name.clone(), Some(record));
        self.ui.print_updated(name)
    }

    /// Like [`Self::update_patch`] but also replaces the patch's description
    /// and committer identity, used by `refresh` to regenerate a patch's
    /// commit from the working tree.
    pub(crate) fn refresh_patch(
        &mut self,
        name: &PatchName,
        new_top: ObjectId,
        description: String,
        committer: crate::patch::Signature,
    ) -> Result<()> {
        let mut record = self.get_patch(name).clone();
        record.rebound(record.bottom, new_top);
        record.description = description;
        record.committer = committer;
        self.updated_patches.insert(name.clone(), Some(record));
        self.ui.print_updated(name)
    }

    /// Adds a brand-new patch on top of the stack. `top` must be a commit
    /// whose sole parent is the current top.
    pub(crate) fn new_applied(
        &mut self,
        name: &PatchName,
        record: PatchRecord,
    ) -> Result<()> {
        self.applied.push(name.clone());
        self.updated_patches.insert(name.clone(), Some(record));
        self.ui.print_pushed(name, PushStatus::New, true)
    }

    /// Pushes and pops patches until `applied` (when given) matches; always
    /// overwrites `unapplied`/`hidden` outright since they carry no
    /// positional git semantics.
    pub(crate) fn reorder_patches(
        &mut self,
        applied: Option<&[PatchName]>,
        unapplied: Option<&[PatchName]>,
        hidden: Option<&[PatchName]>,
    ) -> Result<()> {
        if let Some(applied) = applied {
            let common = self
                .applied
                .iter()
                .zip(applied)
                .take_while(|(a, b)| a == b)
                .count();
            let to_pop: IndexSet<PatchName> = self.applied[common..].iter().cloned().collect();
            self.pop_patches(|name| to_pop.contains(name))?;
            let to_push = &applied[common..];
            self.push_patches(to_push, false)?;
            assert_eq!(self.applied, applied);
        }
        if let Some(unapplied) = unapplied {
            self.unapplied = unapplied.to_vec();
        }
        if let Some(hidden) = hidden {
            self.hidden = hidden.to_vec();
        }
        Ok(())
    }

    pub(crate) fn hide_patches(&mut self, to_hide: &[PatchName]) -> Result<()> {
        let applied: Vec<_> = self.applied.iter().filter(|n| !to_hide.contains(n)).cloned().collect();
        let unapplied: Vec<_> = self.unapplied.iter().filter(|n| !to_hide.contains(n)).cloned().collect();
        let hidden: Vec<_> = to_hide.iter().chain(self.hidden.iter()).cloned().collect();
        self.reorder_patches(Some(&applied), Some(&unapplied), Some(&hidden))?;
        self.ui.print_hidden(to_hide)
    }

    pub(crate) fn unhide_patches(&mut self, to_unhide: &[PatchName]) -> Result<()> {
        let unapplied: Vec<_> = self.unapplied.iter().chain(to_unhide.iter()).cloned().collect();
        let hidden: Vec<_> = self.hidden.iter().filter(|n| !to_unhide.contains(n)).cloned().collect();
        self.reorder_patches(None, Some(&unapplied), Some(&hidden))?;
        self.ui.print_unhidden(to_unhide)
    }

    pub(crate) fn rename_patch(&mut self, old: &PatchName, new: &PatchName) -> Result<()> {
        if old == new {
            return Ok(());
        }
        if self.has_patch(new) {
            return Err(Error::NameCollision(new.to_string()).into());
        }
        if !self.has_patch(old) {
            return Err(Error::UnknownPatch(old.to_string()).into());
        }
        if let Some(pos) = self.applied.iter().position(|n| n == old) {
            self.applied[pos] = new.clone();
        } else if let Some(pos) = self.unapplied.iter().position(|n| n == old) {
            self.unapplied[pos] = new.clone();
        } else if let Some(pos) = self.hidden.iter().position(|n| n == old) {
            self.hidden[pos] = new.clone();
        }
        let record = self.get_patch(old).clone();
        self.updated_patches.insert(old.clone(), None);
        self.updated_patches.insert(new.clone(), Some(record));
        self.ui.print_rename(old, new)
    }

    pub(crate) fn delete_patches(
        &mut self,
        should_delete: impl Fn(&PatchName) -> bool,
    ) -> Result<Vec<PatchName>> {
        let all_popped = match self.applied.iter().position(&should_delete) {
            Some(pos) => self.applied.split_off(pos),
            None => Vec::new(),
        };
        let incidental: Vec<PatchName> = all_popped.iter().filter(|n| !should_delete(n)).cloned().collect();

        self.unapplied.splice(0..0, incidental.iter().cloned());
        self.ui.print_popped(&all_popped)?;

        let mut deleted_group = Vec::new();
        for name in &all_popped {
            if should_delete(name) {
                deleted_group.push(name.clone());
                self.updated_patches.insert(name.clone(), None);
            } else if !deleted_group.is_empty() {
                self.ui.print_deleted(&deleted_group)?;
                deleted_group.clear();
            }
        }

        let old_unapplied = std::mem::take(&mut self.unapplied);
        for name in old_unapplied {
            if should_delete(&name) {
                deleted_group.push(name.clone());
                self.updated_patches.insert(name, None);
            } else {
                if !deleted_group.is_empty() {
                    self.ui.print_deleted(&deleted_group)?;
                    deleted_group.clear();
                }
                self.unapplied.push(name);
            }
        }

        let mut i = 0;
        while i < self.hidden.len() {
            if should_delete(&self.hidden[i]) {
                let name = self.hidden.remove(i);
                deleted_group.push(name.clone());
                self.updated_patches.insert(name, None);
            } else {
                if !deleted_group.is_empty() {
                    self.ui.print_deleted(&deleted_group)?;
                    deleted_group.clear();
                }
                i += 1;
            }
        }
        if !deleted_group.is_empty() {
            self.ui.print_deleted(&deleted_group)?;
        }

        Ok(incidental)
    }

    pub(crate) fn pop_patches(
        &mut self,
        should_pop: impl Fn(&PatchName) -> bool,
    ) -> Result<Vec<PatchName>> {
        let all_popped = match self.applied.iter().position(&should_pop) {
            Some(pos) => self.applied.split_off(pos),
            None => Vec::new(),
        };
        let incidental: Vec<PatchName> = all_popped.iter().filter(|n| !should_pop(n)).cloned().collect();
        let requested: Vec<PatchName> = all_popped.iter().filter(|n| should_pop(n)).cloned().collect();

        let mut new_unapplied = incidental.clone();
        new_unapplied.extend(requested);
        new_unapplied.append(&mut self.unapplied);
        self.unapplied = new_unapplied;

        self.ui.print_popped(&all_popped)?;
        Ok(incidental)
    }

    /// Pushes `patchnames` onto the stack in order. On a conflict, the
    /// conflicting patch is staged as applied-but-empty, the transaction is
    /// marked halted, and no further patches in `patchnames` are attempted.
    pub(crate) fn push_patches(&mut self, patchnames: &[PatchName], check_merged: bool) -> Result<()> {
        let merged: Option<Vec<PatchName>> = if check_merged {
            Some(self.check_merged(patchnames)?)
        } else {
            None
        };

        for (i, name) in patchnames.iter().enumerate() {
            crate::cancel::check()?;
            let is_last = i + 1 == patchnames.len();
            let already_merged = matches!(&merged, Some(m) if m.contains(name));
            self.push_patch(name, already_merged, is_last)?;
        }
        Ok(())
    }

    fn push_patch(&mut self, name: &PatchName, already_merged: bool, is_last: bool) -> Result<()> {
        let repo = self.repo();
        let record = self.get_patch(name).clone();
        let old_bottom_tree = self.tree_of(record.bottom)?;
        let new_bottom = self.top();
        let new_bottom_tree = self.tree_of(new_bottom)?;
        let patch_tree = self.tree_of(record.top)?;

        let mut status = PushStatus::Unmodified;

        let new_tree = if already_merged {
            status = PushStatus::AlreadyMerged;
            new_bottom_tree
        } else if old_bottom_tree == new_bottom_tree {
            patch_tree
        } else if old_bottom_tree == patch_tree {
            new_bottom_tree
        } else if new_bottom_tree == patch_tree {
            patch_tree
        } else {
            repo.switch(new_bottom)?;
            match repo.three_way_merge(old_bottom_tree, new_bottom_tree, patch_tree)? {
                crate::git::MergeOutcome::Clean(tree) => {
                    status = PushStatus::Modified;
                    tree
                }
                crate::git::MergeOutcome::Conflicted => {
                    status = PushStatus::Conflict;
                    if let Some(work_dir) = repo.work_dir() {
                        let diff = repo.diff_trees(old_bottom_tree, patch_tree)?;
                        std::fs::write(failed_patch_path(work_dir), diff)
                            .context("writing .pile-failed.patch")?;
                    }
                    new_bottom_tree
                }
            }
        };

        if new_tree != patch_tree || new_bottom != record.bottom {
            let author = record.author.clone();
            let committer_sig = repo.committer_signature().unwrap_or_else(|_| {
                git_repository::actor::Signature {
                    name: record.committer.name.clone().into(),
                    email: record.committer.email.clone().into(),
                    time: git_repository::date::Time::now_local_or_utc(),
                }
            });
            let author_sig = git_repository::actor::Signature {
                name: author.name.clone().into(),
                email: author.email.clone().into(),
                time: git_repository::date::parse(&author.date, None)
                    .unwrap_or_else(|_| git_repository::date::Time::now_local_or_utc()),
            };
            let new_commit = repo.commit(
                new_tree,
                &[new_bottom],
                author_sig,
                committer_sig.clone(),
                &record.description,
            )?;
            let mut new_record = record.clone();
            new_record.rebound(new_bottom, new_commit);
            new_record.committer = crate::patch::Signature::from_actor(&committer_sig);

            if status == PushStatus::Conflict {
                self.updated_head = Some(new_commit);
            } else if status != PushStatus::AlreadyMerged && new_tree == new_bottom_tree {
                status = PushStatus::Empty;
            }
            self.updated_patches.insert(name.clone(), Some(new_record));
        }

        if status == PushStatus::Conflict {
            self.options.conflict_mode = ConflictMode::Allow;
        }

        if let Some(pos) = self.unapplied.iter().position(|n| n == name) {
            self.unapplied.remove(pos);
        } else if let Some(pos) = self.hidden.iter().position(|n| n == name) {
            self.hidden.remove(pos);
        }
        self.applied.push(name.clone());

        self.ui.print_pushed(name, status, is_last)?;

        if status == PushStatus::Conflict {
            Err(Error::MergeConflict {
                patchname: name.to_string(),
                conflicts: Vec::new(),
            }
            .into())
        } else {
            Ok(())
        }
    }

    /// Patches whose change is already present upstream of the current
    /// base, by patch-id equivalence (`git cherry`), and so would
    /// contribute nothing if pushed.
    fn check_merged(&self, patchnames: &[PatchName]) -> Result<Vec<PatchName>> {
        let repo = self.repo();
        let base = self.base();
        let mut merged = Vec::new();
        for name in patchnames.iter().rev() {
            let record = self.get_patch(name);
            if record.bottom == record.top {
                continue;
            }
            if repo.stupid().cherry_equivalent(base, record.top, record.bottom)? {
                merged.push(name.clone());
            }
        }
        self.ui.print_merged(&merged.iter().collect::<Vec<_>>())?;
        Ok(merged)
    }
}

/// Rejects a transaction that would delete a patch on a protected branch.
/// Non-destructive staging (push, pop, rename, hide) is left alone -- only
/// deletion is a "destructive operation" per the branch's protection.
fn protection_violation(protected: bool, branch: &str, deletes_anything: bool) -> Option<Error> {
    if protected && deletes_anything {
        Some(Error::Protected(branch.to_string()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprotected_branch_allows_deletion() {
        assert!(protection_violation(false, "master", true).is_none());
    }

    #[test]
    fn protected_branch_allows_non_destructive_changes() {
        assert!(protection_violation(true, "master", false).is_none());
    }

    #[test]
    fn protected_branch_rejects_deletion() {
        match protection_violation(true, "master", true) {
            Some(Error::Protected(branch)) => assert_eq!(branch, "master"),
            other => panic!("expected Protected error, got {other:?}"),
        }
    }
}
