// SPDX-License-Identifier: GPL-2.0-only

use anyhow::Result;

use crate::patch::Signature;

use super::ParsedPatch;

/// Splits a plain-diff blob on the first line equal exactly to `---`: text
/// before it is the description (first non-empty line is the subject, the
/// rest is body); text after it is the diff. When no such separator line is
/// present, the whole buffer is treated as diff with an empty description.
pub(super) fn parse_plain(bytes: &[u8], default_name: Option<String>) -> Result<ParsedPatch> {
    let text = String::from_utf8_lossy(bytes);

    let mut split_at = None;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end_matches('\n') == "---" {
            split_at = Some(offset);
            break;
        }
        offset += line.len();
    }

    let (description, diff_start) = match split_at {
        Some(pos) => {
            let sep_len = text[pos..].find('\n').map(|i| i + 1).unwrap_or(text.len() - pos);
            (text[..pos].to_string(), pos + sep_len)
        }
        None => (String::new(), 0),
    };

    Ok(ParsedPatch {
        default_name,
        description: description.trim().to_string(),
        author: Signature {
            name: String::new(),
            email: String::new(),
            date: String::new(),
        },
        diff: text.as_bytes()[diff_start..].to_vec(),
        strip: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_separator() {
        let input = b"add readme\n\nDescribes the project.\n---\ndiff --git a/README b/README\n";
        let parsed = parse_plain(input, None).unwrap();
        assert_eq!(parsed.description, "add readme\n\nDescribes the project.");
        assert_eq!(parsed.diff, b"diff --git a/README b/README\n");
    }

    #[test]
    fn no_separator_is_bare_diff() {
        let input = b"diff --git a/README b/README\n";
        let parsed = parse_plain(input, None).unwrap();
        assert_eq!(parsed.description, "");
        assert_eq!(parsed.diff, input);
    }
}
