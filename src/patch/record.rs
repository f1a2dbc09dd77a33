// SPDX-License-Identifier: GPL-2.0-only

//! In-memory representation of one patch's metadata, mirroring the on-disk
//! `patches/<branch>/patches/<name>/*` files.

use git_repository::ObjectId;

/// An author or committer identity as recorded in a patch's metadata files
/// (`authname`/`authemail`/`authdate`, or the `comm*` equivalents).
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Signature {
    pub(crate) name: String,
    pub(crate) email: String,
    /// Raw date string as git would format it (`<unix-seconds> <±hhmm>`),
    /// forwarded verbatim rather than reparsed.
    pub(crate) date: String,
}

impl Signature {
    pub(crate) fn from_actor(sig: &git_repository::actor::Signature) -> Self {
        Signature {
            name: sig.name.to_string(),
            email: sig.email.to_string(),
            date: sig.time.to_string(),
        }
    }
}

/// One patch's boundary commits and metadata.
#[derive(Clone, Debug)]
pub(crate) struct PatchRecord {
    pub(crate) bottom: ObjectId,
    pub(crate) top: ObjectId,
    pub(crate) old_bottom: Option<ObjectId>,
    pub(crate) old_top: Option<ObjectId>,
    pub(crate) description: String,
    pub(crate) author: Signature,
    pub(crate) committer: Signature,
}

impl PatchRecord {
    pub(crate) fn new(
        bottom: ObjectId,
        top: ObjectId,
        description: String,
        author: Signature,
        committer: Signature,
    ) -> Self {
        PatchRecord {
            bottom,
            top,
            old_bottom: None,
            old_top: None,
            description,
            author,
            committer,
        }
    }

    /// True when this patch's top has the same tree as its bottom, i.e. it
    /// contributes no changes.
    pub(crate) fn is_empty_patch(&self, tree_of: impl Fn(ObjectId) -> anyhow::Result<ObjectId>) -> anyhow::Result<bool> {
        Ok(self.bottom == self.top || tree_of(self.bottom)? == tree_of(self.top)?)
    }

    /// Records the current boundaries into the `.old` slot, then updates
    /// `bottom`/`top` to the new values. Only one level of undo is kept, per
    /// the on-disk format.
    pub(crate) fn rebound(&mut self, new_bottom: ObjectId, new_top: ObjectId) {
        self.old_bottom = Some(self.bottom);
        self.old_top = Some(self.top);
        self.bottom = new_bottom;
        self.top = new_top;
    }

    /// Restores the `.old` boundaries, if any, swapping them with the current
    /// ones (so a second `restore_old_boundaries` undoes the undo).
    pub(crate) fn restore_old_boundaries(&mut self) {
        if let (Some(old_bottom), Some(old_top)) = (self.old_bottom, self.old_top) {
            let (cur_bottom, cur_top) = (self.bottom, self.top);
            self.bottom = old_bottom;
            self.top = old_top;
            self.old_bottom = Some(cur_bottom);
            self.old_top = Some(cur_top);
        }
    }
}
