// SPDX-License-Identifier: GPL-2.0-only

/// How strict a post-transaction checkout should be about pre-existing
/// conflict markers/dirty state in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConflictMode {
    /// Any pre-existing conflicts are fine; the checkout is allowed to run.
    Allow,
    /// Pre-existing conflicts are fine only if the transaction's push target
    /// matches what was already applied (nothing really moved).
    AllowIfSameTop,
    /// Pre-existing conflicts abort the checkout.
    Disallow,
}

#[derive(Debug, Clone)]
pub(crate) struct TransactionOptions {
    /// Move the branch ref / `HEAD` to the transaction's final top.
    pub(crate) set_head: bool,
    /// Update the index and working tree to match the transaction's result.
    pub(crate) use_index_and_worktree: bool,
    /// Discard any local (uncommitted) changes rather than erroring on them.
    pub(crate) discard_changes: bool,
    /// Skip the `HEAD == stack top` consistency check before checkout.
    pub(crate) allow_bad_head: bool,
    pub(crate) conflict_mode: ConflictMode,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        TransactionOptions {
            set_head: true,
            use_index_and_worktree: true,
            discard_changes: false,
            allow_bad_head: false,
            conflict_mode: ConflictMode::Disallow,
        }
    }
}
