// SPDX-License-Identifier: GPL-2.0-only

//! A narrow wrapper around shelling out to the `git` binary.
//!
//! Gitoxide does not (and in some cases cannot) replicate every plumbing
//! command faithfully -- three-way apply/merge heuristics, mail splitting,
//! and trailer interpretation are all behaviors users expect to match
//! whatever `git` they have installed. Rather than reimplement them, we
//! invoke `git` as a subprocess, the same trade the teacher's own `stupid`
//! accessor makes for diff/status formatting.

use std::{
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
};

use anyhow::{anyhow, bail, Context, Result};

use crate::error::Error;

/// Extension trait attaching a [`Stupid`] handle to a repository.
pub(crate) trait StupidExt {
    fn stupid(&self) -> Stupid<'_>;
}

impl StupidExt for git_repository::Repository {
    fn stupid(&self) -> Stupid<'_> {
        Stupid {
            git_dir: self.git_dir().to_path_buf(),
            work_dir: self.work_dir().map(Path::to_path_buf),
            _marker: std::marker::PhantomData,
        }
    }
}

pub(crate) struct Stupid<'repo> {
    git_dir: PathBuf,
    work_dir: Option<PathBuf>,
    #[allow(dead_code)]
    _marker: std::marker::PhantomData<&'repo ()>,
}

impl<'repo> Stupid<'repo> {
    fn command(&self) -> Command {
        let mut command = Command::new("git");
        command.env("GIT_DIR", &self.git_dir);
        if let Some(work_dir) = &self.work_dir {
            command.current_dir(work_dir);
            command.env("GIT_WORK_TREE", work_dir);
        }
        command
    }

    fn run(&self, mut command: Command) -> Result<Output> {
        let output = command
            .stdin(Stdio::null())
            .output()
            .with_context(|| "failed to spawn `git`".to_string())?;
        Ok(output)
    }

    fn run_checked(&self, tool: &str, command: Command) -> Result<Vec<u8>> {
        let output = self.run(command)?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(Error::ExternalToolFailed {
                tool: tool.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into())
        }
    }

    /// `git diff <old-tree> <new-tree>` (or the working tree when `new_tree`
    /// is `None`).
    pub(crate) fn diff(
        &self,
        revspec: &str,
        pathspecs: &[String],
        stat: bool,
        color: bool,
    ) -> Result<Vec<u8>> {
        let mut command = self.command();
        command.arg("diff");
        if stat {
            command.arg("--stat");
        }
        command.arg(if color { "--color" } else { "--no-color" });
        command.arg(revspec);
        if !pathspecs.is_empty() {
            command.arg("--").args(pathspecs);
        }
        self.run_checked("diff", command)
    }

    /// `git diff --name-status <old-tree> <new-tree>` (or `--stat`), used by
    /// the `files` command.
    pub(crate) fn diff_tree_files_status(
        &self,
        old_tree: git_repository::ObjectId,
        new_tree: git_repository::ObjectId,
        stat: bool,
        bare: bool,
        color: bool,
    ) -> Result<Vec<u8>> {
        let mut command = self.command();
        command.arg("diff-tree");
        if stat {
            command.arg("--stat");
        } else {
            command.arg("--name-status");
            if bare {
                command.arg("--name-only");
            }
        }
        command.arg(if color { "--color" } else { "--no-color" });
        command.arg("-r");
        command.arg(old_tree.to_string());
        command.arg(new_tree.to_string());
        self.run_checked("diff-tree", command)
    }

    /// Applies a unified diff to the index (and worktree unless `cached`).
    pub(crate) fn apply(
        &self,
        diff: &[u8],
        strip: u32,
        reject: bool,
        cached: bool,
    ) -> Result<Result<(), Vec<PathBuf>>> {
        let mut command = self.command();
        command.arg("apply").arg(format!("-p{strip}"));
        if cached {
            command.arg("--cached");
        }
        if reject {
            command.arg("--reject");
        }
        command.stdin(Stdio::piped());
        let mut child = command
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| "failed to spawn `git apply`".to_string())?;
        child
            .stdin
            .take()
            .expect("stdin piped")
            .write_all(diff)
            .context("writing diff to `git apply`")?;
        let output = child.wait_with_output().context("waiting on `git apply`")?;
        if output.status.success() {
            Ok(Ok(()))
        } else if reject {
            Ok(Err(find_reject_files(
                self.work_dir.as_deref().unwrap_or(Path::new(".")),
            )?))
        } else {
            Ok(Err(Vec::new()))
        }
    }

    /// `git merge-recursive <base> -- <ours> <theirs>`, operating on the
    /// current index and worktree.
    pub(crate) fn merge_recursive(
        &self,
        base: git_repository::ObjectId,
        ours: git_repository::ObjectId,
        theirs: git_repository::ObjectId,
    ) -> Result<bool> {
        let mut command = self.command();
        command
            .arg("merge-recursive")
            .arg(base.to_string())
            .arg("--")
            .arg(ours.to_string())
            .arg(theirs.to_string());
        let output = self.run(command)?;
        Ok(output.status.success())
    }

    /// `git commit-tree`, with author/committer identity and dates passed
    /// through the environment the way `git` itself expects.
    pub(crate) fn commit_tree(
        &self,
        tree: git_repository::ObjectId,
        parents: &[git_repository::ObjectId],
        author: &git_repository::actor::Signature,
        committer: &git_repository::actor::Signature,
        message: &[u8],
    ) -> Result<git_repository::ObjectId> {
        let mut command = self.command();
        command.arg("commit-tree").arg(tree.to_string());
        for parent in parents {
            command.arg("-p").arg(parent.to_string());
        }
        command
            .env("GIT_AUTHOR_NAME", author.name.to_string())
            .env("GIT_AUTHOR_EMAIL", author.email.to_string())
            .env("GIT_AUTHOR_DATE", author.time.to_string())
            .env("GIT_COMMITTER_NAME", committer.name.to_string())
            .env("GIT_COMMITTER_EMAIL", committer.email.to_string())
            .env("GIT_COMMITTER_DATE", committer.time.to_string());
        command.stdin(Stdio::piped());
        let mut child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("spawning `git commit-tree`")?;
        child.stdin.take().expect("stdin piped").write_all(message)?;
        let output = child.wait_with_output()?;
        if output.status.success() {
            parse_oid(&output.stdout)
        } else {
            Err(Error::ExternalToolFailed {
                tool: "commit-tree".to_string(),
                detail: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into())
        }
    }

    /// `git add -A`, staging every worktree change (modified, new, deleted)
    /// into the index. Used by `refresh` to capture working-tree state
    /// before writing a tree.
    pub(crate) fn update_index_all(&self) -> Result<()> {
        let mut command = self.command();
        command.arg("add").arg("-A").arg("--");
        self.run_checked("add", command)?;
        Ok(())
    }

    pub(crate) fn write_tree(&self) -> Result<git_repository::ObjectId> {
        let mut command = self.command();
        command.arg("write-tree");
        let out = self.run_checked("write-tree", command)?;
        parse_oid(&out)
    }

    /// `git read-tree <tree>` into whatever index `GIT_INDEX_FILE` points
    /// at, without touching HEAD or the worktree. Used to seed a scratch
    /// index for import's apply-onto-tree step.
    pub(crate) fn read_tree(&self, tree: git_repository::ObjectId) -> Result<()> {
        let mut command = self.command();
        command.arg("read-tree").arg(tree.to_string());
        self.run_checked("read-tree", command)?;
        Ok(())
    }

    pub(crate) fn read_tree_checkout(
        &self,
        tree: git_repository::ObjectId,
    ) -> Result<()> {
        let mut command = self.command();
        command.arg("read-tree").arg("--reset").arg("-u").arg(tree.to_string());
        self.run_checked("read-tree", command)?;
        Ok(())
    }

    pub(crate) fn update_ref(
        &self,
        refname: &str,
        new: git_repository::ObjectId,
        expected_old: Option<git_repository::ObjectId>,
    ) -> Result<()> {
        let mut command = self.command();
        command.arg("update-ref").arg(refname).arg(new.to_string());
        if let Some(old) = expected_old {
            command.arg(old.to_string());
        } else {
            command.arg(git_repository::ObjectId::null(git_repository::hash::Kind::Sha1).to_string());
        }
        let output = self.run(command)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::ConcurrentStackMutation.into())
        }
    }

    /// The ref `HEAD` currently points to, e.g. `refs/heads/main`, or `None`
    /// when `HEAD` is detached.
    pub(crate) fn current_branch_refname(&self) -> Result<Option<String>> {
        let mut command = self.command();
        command.arg("symbolic-ref").arg("-q").arg("HEAD");
        let output = self.run(command)?;
        if output.status.success() {
            Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            ))
        } else {
            Ok(None)
        }
    }

    /// Moves whatever `HEAD` resolves to (the current branch if attached,
    /// else `HEAD` itself) to `commit`.
    pub(crate) fn move_head(&self, commit: git_repository::ObjectId) -> Result<()> {
        let target = self
            .current_branch_refname()?
            .unwrap_or_else(|| "HEAD".to_string());
        let mut command = self.command();
        command.arg("update-ref").arg(target).arg(commit.to_string());
        self.run_checked("update-ref", command)?;
        Ok(())
    }

    /// `git cherry <upstream> <head> <limit>`, restricted to the single
    /// commit `head` (whose parent is `limit`): true when its change is
    /// already present upstream by patch-id equivalence.
    pub(crate) fn cherry_equivalent(
        &self,
        upstream: git_repository::ObjectId,
        head: git_repository::ObjectId,
        limit: git_repository::ObjectId,
    ) -> Result<bool> {
        let mut command = self.command();
        command
            .arg("cherry")
            .arg(upstream.to_string())
            .arg(head.to_string())
            .arg(limit.to_string());
        let out = self.run_checked("cherry", command)?;
        Ok(String::from_utf8_lossy(&out)
            .lines()
            .any(|line| line.starts_with('-')))
    }

    pub(crate) fn delete_ref(&self, refname: &str) -> Result<()> {
        let mut command = self.command();
        command.arg("update-ref").arg("-d").arg(refname);
        self.run_checked("update-ref", command)?;
        Ok(())
    }

    /// Runs `f` with `GIT_INDEX_FILE` pointed at a scratch copy of the
    /// repository's index, so `f` can stage changes without disturbing the
    /// real index (used by import's apply-onto-tree step).
    pub(crate) fn with_temp_index<R>(&self, f: impl FnOnce(&Stupid<'_>) -> Result<R>) -> Result<R> {
        let temp_index = tempfile::NamedTempFile::new_in(&self.git_dir)
            .context("creating scratch index")?;
        let index_path = temp_index.into_temp_path();
        let scratch = Stupid {
            git_dir: self.git_dir.clone(),
            work_dir: self.work_dir.clone(),
            _marker: std::marker::PhantomData,
        };
        std::env::set_var("GIT_INDEX_FILE", &index_path);
        let result = f(&scratch);
        std::env::remove_var("GIT_INDEX_FILE");
        result
    }

    /// `git mailsplit`, returning the number of messages written into
    /// `out_dir` as `NNNN` files.
    pub(crate) fn mailsplit(
        &self,
        input: &Path,
        out_dir: &Path,
        keep_cr: bool,
        mbox: bool,
    ) -> Result<u32> {
        let mut command = self.command();
        command.arg("mailsplit").arg(format!("-o{}", out_dir.display()));
        if keep_cr {
            command.arg("--keep-cr");
        }
        if mbox {
            command.arg("-b");
        }
        command.arg(input);
        let out = self.run_checked("mailsplit", command)?;
        String::from_utf8_lossy(&out)
            .trim()
            .parse::<u32>()
            .map_err(|_| anyhow!("unexpected `git mailsplit` output"))
    }

    /// `git mailinfo`, returning `(headers, message_bytes, patch_bytes)`.
    pub(crate) fn mailinfo(&self, raw_mail: &Path) -> Result<MailInfo> {
        let msg_file = tempfile::NamedTempFile::new()?;
        let patch_file = tempfile::NamedTempFile::new()?;
        let mut command = self.command();
        command
            .arg("mailinfo")
            .arg("--encoding=UTF-8")
            .arg(msg_file.path())
            .arg(patch_file.path());
        command.stdin(Stdio::from(std::fs::File::open(raw_mail)?));
        let out = self.run_checked("mailinfo", command)?;
        let headers = parse_mailinfo_headers(&out);
        let body = std::fs::read(msg_file.path())?;
        let patch = std::fs::read(patch_file.path())?;
        Ok(MailInfo {
            subject: headers.subject,
            author: headers.author,
            email: headers.email,
            date: headers.date,
            body,
            patch,
        })
    }

    pub(crate) fn interpret_trailers<'b>(
        &self,
        message: &[u8],
        trailers: impl Iterator<Item = (&'b str, &'b str)>,
    ) -> Result<Vec<u8>> {
        let mut command = self.command();
        command.arg("interpret-trailers").arg("--in-place=false");
        for (key, value) in trailers {
            command.arg("--trailer").arg(format!("{key}: {value}"));
        }
        command.stdin(Stdio::piped());
        let mut child = command
            .stdout(Stdio::piped())
            .spawn()
            .context("spawning `git interpret-trailers`")?;
        child
            .stdin
            .take()
            .expect("stdin piped")
            .write_all(message)?;
        let output = child.wait_with_output()?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            bail!("`git interpret-trailers` failed")
        }
    }
}

fn parse_oid(bytes: &[u8]) -> Result<git_repository::ObjectId> {
    let s = std::str::from_utf8(bytes)
        .map_err(|_| anyhow!("non-UTF-8 object id from git"))?
        .trim();
    git_repository::ObjectId::from_hex(s.as_bytes()).map_err(|e| anyhow!("{e}"))
}

fn find_reject_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut rejects = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)?.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("rej") {
                rejects.push(path);
            }
        }
    }
    Ok(rejects)
}

pub(crate) struct MailInfo {
    pub(crate) subject: Option<String>,
    pub(crate) author: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) date: Option<String>,
    pub(crate) body: Vec<u8>,
    pub(crate) patch: Vec<u8>,
}

struct MailHeaders {
    subject: Option<String>,
    author: Option<String>,
    email: Option<String>,
    date: Option<String>,
}

fn parse_mailinfo_headers(stdout: &[u8]) -> MailHeaders {
    let mut headers = MailHeaders {
        subject: None,
        author: None,
        email: None,
        date: None,
    };
    for line in String::from_utf8_lossy(stdout).lines() {
        if let Some(rest) = line.strip_prefix("Subject: ") {
            headers.subject = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("Author: ") {
            headers.author = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("Email: ") {
            headers.email = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("Date: ") {
            headers.date = Some(rest.to_string());
        }
    }
    headers
}
