// SPDX-License-Identifier: GPL-2.0-only

//! SIGINT handling.
//!
//! External process invocations (editor, git plumbing) cannot be
//! interrupted mid-call, so a SIGINT is only ever translated into a marker
//! that staging code checks between steps (see [`check`]), never delivered
//! as an actual signal to in-flight work.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Result};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Installs the process-wide SIGINT handler. Idempotent; call once from `main`.
pub(crate) fn install() {
    let _ = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst));
}

/// Returns an error if SIGINT was requested since the last call to [`clear`].
pub(crate) fn check() -> Result<()> {
    if INTERRUPTED.load(Ordering::SeqCst) {
        bail!("interrupted");
    }
    Ok(())
}

/// Resets the interrupted marker, e.g. at the start of a new transaction.
pub(crate) fn clear() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}
