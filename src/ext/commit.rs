// SPDX-License-Identifier: GPL-2.0-only

use std::borrow::Cow;

use anyhow::{anyhow, Result};
use bstr::BString;

use crate::wrap::Message;

/// Extension trait for [`git_repository::Commit`].
pub(crate) trait CommitExtended<'a> {
    /// Get author signature, strictly.
    ///
    /// The author signature of an arbitrary git commit object may be encoded
    /// with the commit's declared encoding, but gitoxide performs no decoding
    /// when it parses commit objects. This method takes the commit's encoding
    /// into account and falls back to Latin-1 when strict decoding fails,
    /// since legacy patch metadata frequently carries undeclared Latin-1
    /// author fields.
    fn author_strict(&self) -> Result<git_repository::actor::Signature>;

    /// Get committer signature, strictly. See [`CommitExtended::author_strict`].
    fn committer_strict(&self) -> Result<git_repository::actor::Signature>;

    /// Get commit message with extended capabilities.
    fn message_ex(&self) -> Result<Message<'_>>;

    /// Determine whether the commit has the same tree as its sole parent.
    fn is_no_change(&self) -> Result<bool>;

    fn get_parent_commit(&self) -> Result<git_repository::Commit<'a>>;
}

fn decode_signature_strict(
    sig: git_repository::actor::SignatureRef<'_>,
    encoding_name: Option<&bstr::BStr>,
    commit_id: git_repository::ObjectId,
    role: &str,
) -> Result<git_repository::actor::Signature> {
    let encoding = if let Some(encoding_name) = encoding_name {
        encoding_rs::Encoding::for_label(encoding_name).unwrap_or(encoding_rs::UTF_8)
    } else {
        encoding_rs::UTF_8
    };

    let decode_field = |bytes: &[u8]| -> BString {
        if let Some(s) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            BString::from(s.as_ref())
        } else {
            let (s, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            BString::from(s.as_ref())
        }
    };

    let _ = commit_id;
    let _ = role;
    Ok(git_repository::actor::Signature {
        name: decode_field(sig.name),
        email: decode_field(sig.email),
        time: sig.time,
    })
}

impl<'a> CommitExtended<'a> for git_repository::Commit<'a> {
    fn author_strict(&self) -> Result<git_repository::actor::Signature> {
        let commit_ref = self.decode()?;
        decode_signature_strict(commit_ref.author(), commit_ref.encoding, self.id, "author")
    }

    fn committer_strict(&self) -> Result<git_repository::actor::Signature> {
        let commit_ref = self.decode()?;
        decode_signature_strict(
            commit_ref.committer(),
            commit_ref.encoding,
            self.id,
            "committer",
        )
    }

    fn message_ex(&self) -> Result<Message<'_>> {
        let commit_ref = self.decode()?;
        let encoding = commit_ref
            .encoding
            .and_then(|name| encoding_rs::Encoding::for_label(name));
        Ok(Message::new(
            Cow::Borrowed(commit_ref.message.as_ref()),
            encoding,
        ))
    }

    fn is_no_change(&self) -> Result<bool> {
        let mut parent_ids = self.parent_ids();
        if let Some(parent_id) = parent_ids.next() {
            if parent_ids.next().is_none() {
                let parent_tree_id = parent_id.object()?.try_into_commit()?.tree_id()?;
                let tree_id = self.tree_id()?;
                Ok(parent_tree_id == tree_id)
            } else {
                Ok(false)
            }
        } else {
            Ok(false)
        }
    }

    fn get_parent_commit(&self) -> Result<git_repository::Commit<'a>> {
        Ok(self
            .parent_ids()
            .next()
            .ok_or_else(|| anyhow!("commit `{}` does not have a parent", self.id))?
            .object()?
            .try_into_commit()?)
    }
}
