// SPDX-License-Identifier: GPL-2.0-only

use std::io::Write;

use anyhow::Result;

use crate::{
    patch::Signature,
    stupid::{MailInfo, Stupid},
};

use super::ParsedPatch;

fn mail_info_to_patch(info: MailInfo, default_name: Option<String>, strip: u32) -> ParsedPatch {
    let mut description = info.subject.unwrap_or_default();
    let body = String::from_utf8_lossy(&info.body);
    let body = body.trim();
    if !body.is_empty() {
        if !description.is_empty() {
            description.push_str("\n\n");
        }
        description.push_str(body);
    }
    ParsedPatch {
        default_name,
        description,
        author: Signature {
            name: info.author.unwrap_or_default(),
            email: info.email.unwrap_or_default(),
            date: info.date.unwrap_or_default(),
        },
        diff: info.patch,
        strip,
    }
}

/// Parses a single RFC 2822 message (or a git `format-patch` email) into one
/// patch, via `git mailinfo`.
pub(super) fn parse_mail(
    stupid: Stupid<'_>,
    bytes: &[u8],
    default_name: Option<String>,
) -> Result<ParsedPatch> {
    let mut raw = tempfile::NamedTempFile::new()?;
    raw.write_all(bytes)?;
    let info = stupid.mailinfo(raw.path())?;
    Ok(mail_info_to_patch(info, default_name, 1))
}

/// Parses an mbox of concatenated messages into N patches, via `git
/// mailsplit` followed by one `git mailinfo` per split message.
pub(super) fn parse_mbox(stupid: Stupid<'_>, bytes: &[u8]) -> Result<Vec<ParsedPatch>> {
    let mut raw = tempfile::NamedTempFile::new()?;
    raw.write_all(bytes)?;
    let out_dir = tempfile::tempdir()?;
    let count = stupid.mailsplit(raw.path(), out_dir.path(), false, true)?;

    let mut patches = Vec::with_capacity(count as usize);
    for i in 1..=count {
        let message_path = out_dir.path().join(format!("{i:04}"));
        let info = stupid.mailinfo(&message_path)?;
        patches.push(mail_info_to_patch(info, None, 1));
    }
    Ok(patches)
}
