// SPDX-License-Identifier: GPL-2.0-only

//! Advisory inter-process lock guarding one branch's stack for the
//! lifetime of a single [`crate::transaction::StackTransaction`].
//!
//! The lock is a plain file living alongside the branch's loose patch refs
//! (`$GIT_DIR/refs/patches/<branch>/.pile-lock`), holding the PID of its
//! owner. A holder that crashed leaves a lock file behind; since the PID it
//! recorded is no longer a live process, the next acquirer detects this and
//! takes over rather than blocking forever.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::error::Error;

pub(crate) struct StackLock {
    path: PathBuf,
}

impl StackLock {
    /// `git_dir` is the repository's control directory (`repo.git_dir()`);
    /// taken as a plain path rather than a `Repository` so this has no
    /// dependency on the git backend and can be exercised without one.
    pub(crate) fn acquire(git_dir: &Path, branch: &str) -> Result<Self> {
        let dir = git_dir.join("refs").join("patches").join(branch);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        let path = dir.join(".pile-lock");

        if let Some(holder) = read_pid(&path)? {
            if pid_is_live(holder) {
                return Err(Error::ConcurrentStackMutation.into());
            }
            // Stale: previous holder crashed without releasing the lock.
            let _ = fs::remove_file(&path);
        }

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                write!(file, "{}", std::process::id())?;
                Ok(StackLock { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::ConcurrentStackMutation.into())
            }
            Err(e) => Err(e).context("creating stack lock file"),
        }
    }
}

impl Drop for StackLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn read_pid(path: &PathBuf) -> Result<Option<u32>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents.trim().parse::<u32>().ok()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Whether `pid` names a live process, checked the same way the rest of
/// this crate reaches for external state: shelling out rather than adding a
/// libc dependency for one syscall. Any failure to determine liveness (e.g.
/// no `kill` on this platform) is treated as "still live" so a lock is
/// never stolen out from under a holder we couldn't positively rule out.
fn pid_is_live(pid: u32) -> bool {
    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .output()
        .map(|output| output.status.success())
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_drop_removes_lock_file() {
        let git_dir = tempfile::tempdir().unwrap();
        let lock = StackLock::acquire(git_dir.path(), "master").unwrap();
        let path = git_dir
            .path()
            .join("refs")
            .join("patches")
            .join("master")
            .join(".pile-lock");
        assert!(path.is_file());
        drop(lock);
        assert!(!path.is_file());
    }

    #[test]
    fn second_acquire_while_held_is_concurrent_mutation() {
        let git_dir = tempfile::tempdir().unwrap();
        let _held = StackLock::acquire(git_dir.path(), "master").unwrap();
        let err = StackLock::acquire(git_dir.path(), "master").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ConcurrentStackMutation)
        ));
    }

    #[test]
    fn stale_pid_lock_is_taken_over() {
        let git_dir = tempfile::tempdir().unwrap();
        let lock_dir = git_dir.path().join("refs").join("patches").join("master");
        fs::create_dir_all(&lock_dir).unwrap();
        // A PID essentially guaranteed not to be alive.
        fs::write(lock_dir.join(".pile-lock"), b"999999999").unwrap();
        let lock = StackLock::acquire(git_dir.path(), "master").unwrap();
        drop(lock);
    }
}
