// SPDX-License-Identifier: GPL-2.0-only

//! Thin wrappers around commit message bytes that remember their declared
//! encoding, so a message can be decoded, edited, and re-encoded without
//! losing round-trip fidelity for non-UTF-8 commits.

use std::borrow::Cow;

use anyhow::{anyhow, Result};

/// A commit (or patch) message, possibly still in its raw on-disk encoding.
#[derive(Clone, Debug)]
pub struct Message<'a> {
    raw: Cow<'a, [u8]>,
    encoding: Option<&'static encoding_rs::Encoding>,
}

impl<'a> Message<'a> {
    pub fn new(raw: Cow<'a, [u8]>, encoding: Option<&'static encoding_rs::Encoding>) -> Self {
        Self { raw, encoding }
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// The encoding this message's bytes are expressed in. Defaults to UTF-8
    /// when the originating commit declared none.
    pub fn encoding(&self) -> Result<&'static encoding_rs::Encoding> {
        Ok(self.encoding.unwrap_or(encoding_rs::UTF_8))
    }

    /// Decodes to a `str`, falling back to Latin-1 on invalid sequences for
    /// the declared encoding, matching how author/committer fields are
    /// recovered from legacy commits.
    pub fn decode(&self) -> Result<Cow<'_, str>> {
        let encoding = self.encoding()?;
        let (decoded, _, had_errors) = encoding.decode(&self.raw);
        if had_errors && encoding != encoding_rs::WINDOWS_1252 {
            let (latin1, _, _) = encoding_rs::WINDOWS_1252.decode(&self.raw);
            Ok(Cow::Owned(latin1.into_owned()))
        } else {
            Ok(decoded)
        }
    }

    pub fn into_owned(self) -> Message<'static> {
        Message {
            raw: Cow::Owned(self.raw.into_owned()),
            encoding: self.encoding,
        }
    }
}

impl From<String> for Message<'static> {
    fn from(s: String) -> Self {
        Message {
            raw: Cow::Owned(s.into_bytes()),
            encoding: Some(encoding_rs::UTF_8),
        }
    }
}

impl<'a> From<&'a str> for Message<'a> {
    fn from(s: &'a str) -> Self {
        Message {
            raw: Cow::Borrowed(s.as_bytes()),
            encoding: Some(encoding_rs::UTF_8),
        }
    }
}

impl<'a> TryFrom<Message<'a>> for String {
    type Error = anyhow::Error;

    fn try_from(message: Message<'a>) -> Result<String> {
        message
            .decode()
            .map(|cow| cow.into_owned())
            .map_err(|e| anyhow!(e))
    }
}
