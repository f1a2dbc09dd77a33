// SPDX-License-Identifier: GPL-2.0-only

use anyhow::Result;

use crate::patch::PatchName;

use super::ParsedPatch;

/// Strips a leading `NNN-` ordinal and a trailing `.diff`/`.patch` suffix,
/// the `--stripname` policy.
fn stripname(candidate: &str) -> String {
    let mut s = candidate;
    if let Some(rest) = s.split_once('-') {
        if !rest.0.is_empty() && rest.0.chars().all(|c| c.is_ascii_digit()) {
            s = rest.1;
        }
    }
    s.strip_suffix(".diff")
        .or_else(|| s.strip_suffix(".patch"))
        .unwrap_or(s)
        .to_string()
}

fn subject_line(description: &str) -> &str {
    description.lines().find(|l| !l.trim().is_empty()).unwrap_or("patch")
}

/// Determines the final name for a parsed patch: `explicit_name` (from
/// `--name`) wins, then the source's own suggested name, then a heuristic
/// derived from the patch's subject line. The result is then uniquified
/// against `taken`.
pub(crate) fn derive_name(
    explicit_name: Option<&str>,
    parsed: &ParsedPatch,
    do_stripname: bool,
    limit: usize,
    taken: &impl Fn(&str) -> bool,
) -> Result<PatchName> {
    let candidate = if let Some(name) = explicit_name {
        name.to_string()
    } else if let Some(name) = &parsed.default_name {
        name.clone()
    } else {
        PatchName::sanitize(subject_line(&parsed.description), limit)
    };

    let candidate = if do_stripname {
        stripname(&candidate)
    } else {
        candidate
    };

    let sanitized = PatchName::sanitize(&candidate, limit);
    Ok(PatchName::uniquify(sanitized, taken))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripname_drops_ordinal_and_suffix() {
        assert_eq!(stripname("0001-fix-thing.patch"), "fix-thing");
        assert_eq!(stripname("no-ordinal.diff"), "no-ordinal");
    }
}
