// SPDX-License-Identifier: GPL-2.0-only

//! Typed error taxonomy for stack and import operations.
//!
//! Most call sites propagate failures as `anyhow::Result`; this enum exists
//! for the subset of errors that callers (command implementations, tests)
//! need to match on rather than merely display.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("branch `{0}` is not initialised")]
    NotInitialised(String),

    #[error("invalid patch name `{0}`")]
    InvalidName(String),

    #[error("patch name `{0}` is already in use")]
    NameCollision(String),

    #[error("unknown patch `{0}`")]
    UnknownPatch(String),

    #[error("operation would break stack invariants: {0}")]
    StackInvariantWouldBreak(String),

    #[error("local changes in working tree or index: {0}")]
    LocalChanges(String),

    #[error("patch did not apply cleanly")]
    ApplyFailed { rejects: Vec<PathBuf> },

    #[error("merge conflicts while pushing `{patchname}`")]
    MergeConflict {
        patchname: String,
        conflicts: Vec<PathBuf>,
    },

    #[error("stack was concurrently modified")]
    ConcurrentStackMutation,

    #[error("archive contains unsafe path `{0}`")]
    UnsafeArchive(String),

    #[error("unsupported strip level `{0}`")]
    UnsupportedStripLevel(String),

    #[error("`{tool}` failed: {detail}")]
    ExternalToolFailed { tool: String, detail: String },

    #[error("branch `{0}` is protected")]
    Protected(String),

    #[error("failed writing stack state at step `{step}`: {detail}")]
    StackWriteFailed { step: String, detail: String },
}

impl Error {
    /// Maps this error onto the process exit-code table.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ConcurrentStackMutation => 3,
            Error::StackWriteFailed { .. } => 2,
            _ => 1,
        }
    }
}
