// SPDX-License-Identifier: GPL-2.0-only

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Default maximum length for a generated or user-supplied patch name,
/// overridable via the `stgit.namelength` config key.
const DEFAULT_LENGTH_LIMIT: usize = 50;

/// A validated patch name: `[A-Za-z0-9._][A-Za-z0-9._-]*`, no `..`, and not
/// ending in `.lock` (the same rules git applies to ref components, since a
/// patch name is also the last path segment of `refs/patches/<branch>/<name>`).
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub(crate) struct PatchName(String);

impl PatchName {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn validate(name: &str) -> Result<(), Error> {
        let mut chars = name.chars();
        let first = match chars.next() {
            Some(c) => c,
            None => return Err(Error::InvalidName(name.to_string())),
        };
        if !(first.is_ascii_alphanumeric() || first == '.' || first == '_') {
            return Err(Error::InvalidName(name.to_string()));
        }
        for c in chars {
            if !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')) {
                return Err(Error::InvalidName(name.to_string()));
            }
        }
        if name.contains("..") || name.ends_with(".lock") {
            return Err(Error::InvalidName(name.to_string()));
        }
        Ok(())
    }

    /// Reads `stgit.namelength` from the given config, falling back to
    /// [`DEFAULT_LENGTH_LIMIT`].
    pub(crate) fn length_limit(config: &git_repository::config::Snapshot<'_>) -> usize {
        config
            .integer("stgit.namelength")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_LENGTH_LIMIT)
    }

    /// Sanitizes arbitrary text (e.g. a commit subject line) into a candidate
    /// patch name: invalid characters become `-`, runs collapse, and
    /// leading/trailing `-` are trimmed.
    pub(crate) fn sanitize(raw: &str, limit: usize) -> String {
        let mut out = String::new();
        let mut last_was_dash = false;
        for c in raw.chars() {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                out.push(c);
                last_was_dash = c == '-';
            } else if !last_was_dash {
                out.push('-');
                last_was_dash = true;
            }
        }
        let trimmed = out.trim_matches('-');
        let truncated: String = trimmed.chars().take(limit).collect();
        let truncated = truncated.trim_end_matches('-');
        if truncated.is_empty() {
            "patch".to_string()
        } else {
            truncated.to_string()
        }
    }

    /// Appends `-2`, `-3`, ... until `candidate` is not in `taken`.
    pub(crate) fn uniquify(candidate: String, taken: &impl Fn(&str) -> bool) -> PatchName {
        if !taken(&candidate) {
            return PatchName(candidate);
        }
        let mut n = 2;
        loop {
            let attempt = format!("{candidate}-{n}");
            if !taken(&attempt) {
                return PatchName(attempt);
            }
            n += 1;
        }
    }
}

impl FromStr for PatchName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::validate(s)?;
        Ok(PatchName(s.to_string()))
    }
}

impl fmt::Display for PatchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PatchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["foo", "foo-bar", "foo.bar", "foo_bar", "a1.b2-c3"] {
            assert!(PatchName::from_str(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn invalid_names() {
        for name in ["", "-foo", "foo/bar", "foo..bar", "foo.lock", "*foo"] {
            assert!(
                PatchName::from_str(name).is_err(),
                "{name} should be invalid"
            );
        }
    }

    #[test]
    fn sanitize_collapses_and_trims() {
        assert_eq!(PatchName::sanitize("  Fix the/thing!!  ", 50), "Fix-the-thing");
    }

    #[test]
    fn uniquify_appends_suffix() {
        let taken = |s: &str| matches!(s, "foo" | "foo-2");
        let name = PatchName::uniquify("foo".to_string(), &taken);
        assert_eq!(name.as_str(), "foo-3");
    }
}
