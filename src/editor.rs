// SPDX-License-Identifier: GPL-2.0-only

//! Round-trips a patch description through an external editor.
//!
//! The scratch file is `.pile.msg` in the work tree, holding the editable
//! description followed by an `STG:`-commented block and an `STG_PATCH:`
//! marker; everything from the marker onward (comments and an optional diff
//! preview) is dropped once the editor exits.

use std::{io::Write, process::Command};

use anyhow::{anyhow, bail, Context, Result};

const MARKER: &str = "STG_PATCH:";

/// Picks the editor command: `stgit.editor` config, then `GIT_EDITOR`,
/// `VISUAL`, `EDITOR`, falling back to `vi`.
fn editor_command(repo: &git_repository::Repository) -> String {
    repo.config_snapshot()
        .string("stgit.editor")
        .map(|s| s.into_owned().to_string())
        .or_else(|| std::env::var("GIT_EDITOR").ok())
        .or_else(|| std::env::var("VISUAL").ok())
        .or_else(|| std::env::var("EDITOR").ok())
        .unwrap_or_else(|| "vi".to_string())
}

fn scratch_path(repo: &git_repository::Repository) -> Result<std::path::PathBuf> {
    let work_dir = repo
        .work_dir()
        .ok_or_else(|| anyhow!("cannot edit a patch description in a bare repository"))?;
    Ok(work_dir.join(".pile.msg"))
}

/// Opens the configured editor on `description` (plus, if given, a diff
/// `preview` appended below the `STG_PATCH:` marker for reference), and
/// returns the edited description. The scratch file is removed on every exit
/// path.
pub(crate) fn edit_description(
    repo: &git_repository::Repository,
    description: &str,
    preview: Option<&[u8]>,
) -> Result<String> {
    let path = scratch_path(repo)?;
    let result = (|| -> Result<String> {
        write_scratch_file(&path, description, preview)?;

        let editor = editor_command(repo);
        let status = shell_words(&editor)
            .into_iter()
            .collect::<Vec<_>>()
            .split_first()
            .ok_or_else(|| anyhow!("empty editor command"))
            .and_then(|(cmd, args)| {
                Command::new(cmd)
                    .args(args)
                    .arg(&path)
                    .status()
                    .with_context(|| format!("running editor `{editor}`"))
            })?;

        if !status.success() {
            bail!("editor `{editor}` exited with status {status}");
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading back `{}`", path.display()))?;
        Ok(strip_comments(&raw))
    })();

    let _ = std::fs::remove_file(&path);
    result
}

fn write_scratch_file(
    path: &std::path::Path,
    description: &str,
    preview: Option<&[u8]>,
) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("creating `{}`", path.display()))?;
    file.write_all(description.as_bytes())?;
    if !description.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    writeln!(file, "STG: Please enter the description for the patch above.")?;
    writeln!(file, "STG: Lines starting with STG: will be removed.")?;
    writeln!(file, "{MARKER}")?;
    if let Some(diff) = preview {
        writeln!(file, "STG: The diff below is shown for reference only; it is not editable.")?;
        file.write_all(diff)?;
    }
    Ok(())
}

/// Drops every `STG:`-prefixed line up to and including the `STG_PATCH:`
/// marker, discards everything after it (the preview), and trims trailing
/// blank lines from what remains.
fn strip_comments(raw: &str) -> String {
    let mut out_lines = Vec::new();
    for line in raw.lines() {
        if line.trim_end() == MARKER {
            break;
        }
        if line.starts_with("STG:") {
            continue;
        }
        out_lines.push(line);
    }
    while matches!(out_lines.last(), Some(l) if l.trim().is_empty()) {
        out_lines.pop();
    }
    out_lines.join("\n")
}

/// Minimal whitespace-based command-line splitting for editor strings like
/// `vim -f` or `code --wait`; good enough for the common case without
/// pulling in a shell.
fn shell_words(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comment_block_and_preview() {
        let raw = "subject\n\nbody\nSTG: comment one\nSTG: comment two\nSTG_PATCH:\ndiff --git a/x b/x\n";
        assert_eq!(strip_comments(raw), "subject\n\nbody");
    }

    #[test]
    fn trims_trailing_blank_lines() {
        let raw = "subject\n\n\nSTG_PATCH:\n";
        assert_eq!(strip_comments(raw), "subject");
    }

    #[test]
    fn splits_editor_command_with_args() {
        assert_eq!(shell_words("vim -f"), vec!["vim", "-f"]);
    }
}
