// SPDX-License-Identifier: GPL-2.0-only

//! High-level StGit stack representation: the branch-scoped handle command
//! implementations open, query, and mutate through a [`Transaction`].

mod lock;
pub(crate) mod state;

use anyhow::{anyhow, Result};
use git_repository::ObjectId;

use crate::{
    error::Error,
    git::GitBackend,
    patch::PatchName,
    stupid::StupidExt,
    transaction::TransactionBuilder,
};
pub(crate) use lock::StackLock;
pub(crate) use state::StackState;

/// Policy for stack initialization when opening/discovering a stack for a
/// branch.
pub(crate) enum InitializationPolicy {
    /// Initialize if not already initialized.
    AutoInitialize,
    /// Must not already be initialized.
    MustInitialize,
    /// Must already be initialized.
    RequireInitialized,
    /// An uninitialized stack is allowed; transactions are prohibited on the
    /// resulting handle.
    AllowUninitialized,
}

pub(crate) struct Stack<'repo> {
    pub(crate) repo: &'repo git_repository::Repository,
    pub(crate) state: StackState,
    is_initialized: bool,
    /// Digest of `state` as it was loaded/just persisted, compared against
    /// the on-disk state again right before a transaction commits to detect
    /// a concurrent writer that slipped in between (§5, `ConcurrentStackMutation`).
    pub(crate) snapshot_digest: u64,
}

impl<'repo> Stack<'repo> {
    pub(crate) fn from_branch(
        repo: &'repo git_repository::Repository,
        branch_name: Option<&str>,
        init_policy: InitializationPolicy,
    ) -> Result<Self> {
        let branch_name = resolve_branch_name(repo, branch_name)?;

        if let Some(state) = state::load(repo, &branch_name)? {
            if matches!(init_policy, InitializationPolicy::MustInitialize) {
                return Err(Error::StackInvariantWouldBreak(format!(
                    "branch `{branch_name}` already initialized"
                ))
                .into());
            }
            let snapshot_digest = state.digest();
            Ok(Self {
                repo,
                state,
                is_initialized: true,
                snapshot_digest,
            })
        } else if matches!(init_policy, InitializationPolicy::RequireInitialized) {
            Err(Error::NotInitialised(branch_name).into())
        } else {
            let head = repo.head_id()?;
            let state = state::new_at(&branch_name, head);
            let is_initialized = matches!(
                init_policy,
                InitializationPolicy::AutoInitialize | InitializationPolicy::MustInitialize
            );
            if is_initialized {
                state::save(repo, &state, &Default::default(), &[])?;
            }
            let snapshot_digest = state.digest();
            Ok(Self {
                repo,
                state,
                is_initialized,
                snapshot_digest,
            })
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    /// Rebuilds a handle around freshly committed state, as the last step of
    /// [`crate::transaction::ExecuteContext::execute`].
    pub(crate) fn rebuild(repo: &'repo git_repository::Repository, state: StackState) -> Self {
        let snapshot_digest = state.digest();
        Stack {
            repo,
            state,
            is_initialized: true,
            snapshot_digest,
        }
    }

    pub(crate) fn branch_name(&self) -> &str {
        &self.state.branch
    }

    /// Removes all StGit state for this branch: the `patches/<branch>` tree,
    /// `refs/bases/<branch>`, and every `refs/patches/<branch>/*`.
    pub(crate) fn deinitialize(self) -> Result<()> {
        let dir = state::branch_dir(self.repo, &self.state.branch);
        if dir.is_dir() {
            std::fs::remove_dir_all(&dir)?;
        }
        let _ = self.repo.delete_ref(&state::base_refname(&self.state.branch));
        for name in self.state.all_names() {
            let _ = self
                .repo
                .delete_ref(&state::patch_refname(&self.state.branch, name.as_str()));
        }
        Ok(())
    }

    pub(crate) fn is_protected(&self) -> bool {
        self.state.protected
    }

    pub(crate) fn set_protected(&mut self, protect: bool) -> Result<()> {
        self.state.protected = protect;
        state::save(self.repo, &self.state, &Default::default(), &[])
    }

    /// Whether `HEAD` matches the top of the applied stack (or `base` when
    /// nothing is applied). A mismatch means the branch was modified by
    /// plain git outside of a transaction.
    pub(crate) fn check_head_top_mismatch(&self) -> Result<()> {
        let head = self.repo.head_id()?;
        let expected = self.top_id()?;
        if head == expected {
            Ok(())
        } else {
            Err(anyhow!(
                "HEAD and stack top are not the same. \
                 This can happen if you modify the branch with git. \
                 See `pile repair --help` for next steps to take."
            ))
        }
    }

    pub(crate) fn top_id(&self) -> Result<ObjectId> {
        Ok(match self.state.current() {
            Some(name) => self.state.get_patch(name)?.top,
            None => self.state.base,
        })
    }

    pub(crate) fn is_worktree_clean(&self) -> Result<bool> {
        self.repo.is_worktree_clean()
    }

    /// Opens a transaction to mutate this stack. Requires the stack to have
    /// been initialized. Acquires the advisory per-branch stack lock, held
    /// for the lifetime of the returned builder's transaction (released
    /// whether it is committed or dropped unexecuted); a lock already held
    /// by a live process is reported as [`Error::ConcurrentStackMutation`].
    pub(crate) fn setup_transaction(self) -> Result<TransactionBuilder<'repo>> {
        assert!(
            self.is_initialized,
            "attempted transaction on uninitialized stack"
        );
        let branch = self.state.branch.clone();
        let lock = StackLock::acquire(self.repo.git_dir(), &branch)?;
        Ok(TransactionBuilder::new(self, lock))
    }

    pub(crate) fn patch_refname(&self, name: &PatchName) -> String {
        state::patch_refname(&self.state.branch, name.as_str())
    }
}

fn resolve_branch_name(
    repo: &git_repository::Repository,
    branch_name: Option<&str>,
) -> Result<String> {
    if let Some(name) = branch_name {
        return Ok(name.to_string());
    }
    let refname = repo
        .stupid()
        .current_branch_refname()?
        .ok_or_else(|| anyhow!("not currently on any branch"))?;
    refname
        .strip_prefix("refs/heads/")
        .map(str::to_string)
        .ok_or_else(|| anyhow!("HEAD does not point to a branch ref: {refname}"))
}
