// SPDX-License-Identifier: GPL-2.0-only

use std::path::Path;

use anyhow::{Context, Result};

use crate::{error::Error, stupid::StupidExt};

use super::{mail, plain, ParsedPatch};

struct SeriesEntry {
    filename: String,
    strip: u32,
}

fn parse_entry(line: &str) -> Result<Option<SeriesEntry>> {
    let line = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    let filename = parts.next().expect("non-empty after trim").to_string();
    let mut strip = 1;
    for token in parts {
        if let Some(level) = token.strip_prefix("-p") {
            strip = match level {
                "0" => 0,
                "1" | "" => 1,
                other => return Err(Error::UnsupportedStripLevel(other.to_string()).into()),
            };
        }
    }
    Ok(Some(SeriesEntry { filename, strip }))
}

/// Parses a quilt-style series file: one patch filename per line, `#` to
/// end-of-line is a comment, blank lines are skipped, and a trailing
/// `-p<N>` token records the strip level for that entry.
pub(super) fn parse_series_bytes(
    repo: &git_repository::Repository,
    bytes: &[u8],
    dir: &Path,
    _default_name: Option<String>,
) -> Result<Vec<ParsedPatch>> {
    let text = String::from_utf8_lossy(bytes);
    let mut patches = Vec::new();

    for line in text.lines() {
        let entry = match parse_entry(line)? {
            Some(entry) => entry,
            None => continue,
        };
        let path = dir.join(&entry.filename);
        let contents = std::fs::read(&path)
            .with_context(|| format!("reading series entry `{}`", entry.filename))?;
        let default_name = Some(entry.filename.replace(['/', '\\'], "-"));

        let mut parsed = if is_mail(&contents) {
            mail::parse_mail(repo.stupid(), &contents, default_name)?
        } else {
            plain::parse_plain(&contents, default_name)?
        };
        parsed.strip = entry.strip;
        patches.push(parsed);
    }

    Ok(patches)
}

fn is_mail(bytes: &[u8]) -> bool {
    bytes.starts_with(b"From ") || bytes.windows(8).any(|w| w == b"\nSubject")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entry_with_strip_level() {
        let entry = parse_entry("b.patch -p0 # comment").unwrap().unwrap();
        assert_eq!(entry.filename, "b.patch");
        assert_eq!(entry.strip, 0);
    }

    #[test]
    fn rejects_unsupported_strip_level() {
        assert!(parse_entry("b.patch -pab").is_err());
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert!(parse_entry("# just a comment").unwrap().is_none());
        assert!(parse_entry("   ").unwrap().is_none());
    }
}
