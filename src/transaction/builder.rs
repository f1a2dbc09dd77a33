// SPDX-License-Identifier: GPL-2.0-only

use anyhow::Result;
use termcolor::WriteColor;

use crate::stack::{Stack, StackLock};

use super::{
    options::{ConflictMode, TransactionOptions},
    ui::TransactionUserInterface,
    ExecuteContext, StackTransaction,
};

pub(crate) struct TransactionBuilder<'repo> {
    stack: Stack<'repo>,
    lock: StackLock,
    options: TransactionOptions,
    output: Option<Box<dyn WriteColor + Send>>,
}

impl<'repo> TransactionBuilder<'repo> {
    pub(crate) fn new(stack: Stack<'repo>, lock: StackLock) -> Self {
        TransactionBuilder {
            stack,
            lock,
            options: TransactionOptions::default(),
            output: None,
        }
    }

    pub(crate) fn with_output_stream(mut self, stream: Box<dyn WriteColor + Send>) -> Self {
        self.output = Some(stream);
        self
    }

    pub(crate) fn set_head(mut self, set_head: bool) -> Self {
        self.options.set_head = set_head;
        self
    }

    pub(crate) fn use_index_and_worktree(mut self, use_it: bool) -> Self {
        self.options.use_index_and_worktree = use_it;
        self
    }

    pub(crate) fn discard_changes(mut self, discard: bool) -> Self {
        self.options.discard_changes = discard;
        self
    }

    pub(crate) fn allow_bad_head(mut self, allow: bool) -> Self {
        self.options.allow_bad_head = allow;
        self
    }

    pub(crate) fn conflict_mode(mut self, mode: ConflictMode) -> Self {
        self.options.conflict_mode = mode;
        self
    }

    /// Runs `f` against a fresh [`StackTransaction`] staging area, then
    /// returns an [`ExecuteContext`] that must be finalized with
    /// [`ExecuteContext::execute`].
    pub(crate) fn transact(
        self,
        f: impl FnOnce(&mut StackTransaction<'repo>) -> Result<()>,
    ) -> ExecuteContext<'repo> {
        let current_tree_id = self
            .stack
            .repo
            .head_commit()
            .ok()
            .and_then(|c| c.tree_id().ok())
            .map(|id| id.detach());

        let mut transaction = StackTransaction {
            applied: self.stack.state.applied.clone(),
            unapplied: self.stack.state.unapplied.clone(),
            hidden: self.stack.state.hidden.clone(),
            updated_patches: Default::default(),
            updated_head: None,
            updated_base: None,
            current_tree_id,
            halt: None,
            ui: TransactionUserInterface::new(self.output),
            options: self.options,
            stack: self.stack,
            _lock: self.lock,
        };

        if let Err(err) = f(&mut transaction) {
            if transaction.halt.is_none() {
                transaction.halt = Some(err);
            }
        }

        ExecuteContext(transaction)
    }
}
