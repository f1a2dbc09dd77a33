// SPDX-License-Identifier: GPL-2.0-only

//! The narrow surface the rest of the engine uses to talk to git: object and
//! ref access through `gix`, plumbing operations (`apply`, `merge-recursive`,
//! `mailsplit`/`mailinfo`) through the [`Stupid`](crate::stupid::Stupid)
//! subprocess wrapper.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::{
    error::Error,
    ext::{CommitExtended, RepositoryExtended},
    stupid::StupidExt,
};

/// Outcome of a merge-like plumbing operation.
pub(crate) enum MergeOutcome {
    Clean(git_repository::ObjectId),
    Conflicted,
}

/// The capability surface every stack/transaction/import operation is
/// written against. Implemented for [`git_repository::Repository`] so
/// command code keeps using the repository handle it already has.
pub(crate) trait GitBackend {
    fn resolve(&self, refname: &str) -> Result<Option<git_repository::ObjectId>>;

    fn read_commit(&self, id: git_repository::ObjectId) -> Result<git_repository::Commit<'_>>;

    fn commit(
        &self,
        tree: git_repository::ObjectId,
        parents: &[git_repository::ObjectId],
        author: git_repository::actor::Signature,
        committer: git_repository::actor::Signature,
        message: &str,
    ) -> Result<git_repository::ObjectId>;

    fn diff_trees(
        &self,
        old_tree: git_repository::ObjectId,
        new_tree: git_repository::ObjectId,
    ) -> Result<Vec<u8>>;

    fn apply_diff_to_index(&self, diff: &[u8], strip: u32) -> Result<bool>;

    fn three_way_merge(
        &self,
        base: git_repository::ObjectId,
        ours: git_repository::ObjectId,
        theirs: git_repository::ObjectId,
    ) -> Result<MergeOutcome>;

    fn switch(&self, commit: git_repository::ObjectId) -> Result<()>;

    fn reset(&self, commit: git_repository::ObjectId, check_out: bool) -> Result<()>;

    fn update_ref(
        &self,
        name: &str,
        new: git_repository::ObjectId,
        expected_old: Option<git_repository::ObjectId>,
    ) -> Result<()>;

    fn delete_ref(&self, name: &str) -> Result<()>;

    fn head_id(&self) -> Result<git_repository::ObjectId>;

    fn is_worktree_clean(&self) -> Result<bool>;
}

impl GitBackend for git_repository::Repository {
    fn resolve(&self, refname: &str) -> Result<Option<git_repository::ObjectId>> {
        match self.try_find_reference(refname)? {
            Some(mut reference) => Ok(Some(reference.peel_to_id_in_place()?.detach())),
            None => Ok(None),
        }
    }

    fn read_commit(&self, id: git_repository::ObjectId) -> Result<git_repository::Commit<'_>> {
        Ok(self.find_object(id)?.try_into_commit()?)
    }

    fn commit(
        &self,
        tree: git_repository::ObjectId,
        parents: &[git_repository::ObjectId],
        author: git_repository::actor::Signature,
        committer: git_repository::actor::Signature,
        message: &str,
    ) -> Result<git_repository::ObjectId> {
        self.stupid()
            .commit_tree(tree, parents, &author, &committer, message.as_bytes())
            .context("creating commit")
    }

    fn diff_trees(
        &self,
        old_tree: git_repository::ObjectId,
        new_tree: git_repository::ObjectId,
    ) -> Result<Vec<u8>> {
        self.stupid()
            .diff_tree_files_status(old_tree, new_tree, false, false, false)
    }

    fn apply_diff_to_index(&self, diff: &[u8], strip: u32) -> Result<bool> {
        Ok(self
            .stupid()
            .apply(diff, strip, false, true)?
            .is_ok())
    }

    fn three_way_merge(
        &self,
        base: git_repository::ObjectId,
        ours: git_repository::ObjectId,
        theirs: git_repository::ObjectId,
    ) -> Result<MergeOutcome> {
        if self.stupid().merge_recursive(base, ours, theirs)? {
            Ok(MergeOutcome::Clean(self.stupid().write_tree()?))
        } else {
            Ok(MergeOutcome::Conflicted)
        }
    }

    fn switch(&self, commit: git_repository::ObjectId) -> Result<()> {
        let tree = self.read_commit(commit)?.tree_id()?.detach();
        self.stupid().read_tree_checkout(tree)?;
        self.stupid().move_head(commit)
    }

    fn reset(&self, commit: git_repository::ObjectId, check_out: bool) -> Result<()> {
        if check_out {
            self.switch(commit)
        } else {
            self.stupid().move_head(commit)
        }
    }

    fn update_ref(
        &self,
        name: &str,
        new: git_repository::ObjectId,
        expected_old: Option<git_repository::ObjectId>,
    ) -> Result<()> {
        self.stupid().update_ref(name, new, expected_old)
    }

    fn delete_ref(&self, name: &str) -> Result<()> {
        self.stupid().delete_ref(name)
    }

    fn head_id(&self) -> Result<git_repository::ObjectId> {
        Ok(self.head_id()?.detach())
    }

    fn is_worktree_clean(&self) -> Result<bool> {
        let status = self
            .stupid()
            .diff("HEAD", &[], false, false)
            .unwrap_or_default();
        Ok(status.is_empty())
    }
}

/// Paths the engine leaves in the work tree as side effects of a failed
/// apply, per the on-disk layout.
pub(crate) fn failed_patch_path(work_dir: &std::path::Path) -> PathBuf {
    work_dir.join(".pile-failed.patch")
}

pub(crate) fn map_update_ref_err(err: anyhow::Error) -> anyhow::Error {
    if err.downcast_ref::<Error>().is_some() {
        err
    } else {
        Error::ConcurrentStackMutation.into()
    }
}
