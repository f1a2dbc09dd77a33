// SPDX-License-Identifier: GPL-2.0-only

//! Patch identity and metadata.

mod name;
mod record;

pub(crate) use name::PatchName;
pub(crate) use record::{PatchRecord, Signature};
