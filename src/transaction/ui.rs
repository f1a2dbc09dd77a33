// SPDX-License-Identifier: GPL-2.0-only

//! User-facing progress reporting for a running transaction, separated from
//! the staging logic so tests can exercise the latter without a terminal.

use anyhow::Result;
use termcolor::{Color, WriteColor};

use crate::{output::status_line, patch::PatchName};

use super::PushStatus;

pub(crate) struct TransactionUserInterface {
    stream: Option<Box<dyn WriteColor + Send>>,
    printed_top: bool,
}

impl TransactionUserInterface {
    pub(crate) fn new(stream: Option<Box<dyn WriteColor + Send>>) -> Self {
        TransactionUserInterface {
            stream,
            printed_top: false,
        }
    }

    pub(crate) fn printed_top(&self) -> bool {
        self.printed_top
    }

    fn line(&mut self, symbol: char, color: Option<Color>, text: &str) -> Result<()> {
        if let Some(stream) = self.stream.as_deref_mut() {
            status_line(stream, symbol, color, text)?;
        }
        Ok(())
    }

    pub(crate) fn print_pushed(
        &mut self,
        patchname: &PatchName,
        status: PushStatus,
        is_last: bool,
    ) -> Result<()> {
        let (symbol, color, suffix) = match status {
            PushStatus::New => ('+', Some(Color::Green), ""),
            PushStatus::AlreadyMerged => ('-', Some(Color::Yellow), " (merged)"),
            PushStatus::Conflict => ('!', Some(Color::Red), " (conflict)"),
            PushStatus::Empty => ('+', Some(Color::Yellow), " (empty)"),
            PushStatus::Modified => ('>', Some(Color::Green), ""),
            PushStatus::Unmodified => ('>', None, ""),
        };
        self.line(symbol, color, &format!("{patchname}{suffix}"))?;
        if is_last {
            self.printed_top = true;
        }
        Ok(())
    }

    pub(crate) fn print_popped(&mut self, patchnames: &[PatchName]) -> Result<()> {
        for patchname in patchnames {
            self.line('-', Some(Color::Yellow), patchname.as_str())?;
        }
        Ok(())
    }

    pub(crate) fn print_deleted(&mut self, patchnames: &[PatchName]) -> Result<()> {
        for patchname in patchnames {
            self.line('D', Some(Color::Red), patchname.as_str())?;
        }
        Ok(())
    }

    pub(crate) fn print_hidden(&mut self, patchnames: &[PatchName]) -> Result<()> {
        for patchname in patchnames {
            self.line('h', None, patchname.as_str())?;
        }
        Ok(())
    }

    pub(crate) fn print_unhidden(&mut self, patchnames: &[PatchName]) -> Result<()> {
        for patchname in patchnames {
            self.line('u', None, patchname.as_str())?;
        }
        Ok(())
    }

    pub(crate) fn print_updated(&mut self, patchname: &PatchName) -> Result<()> {
        self.line('>', Some(Color::Cyan), patchname.as_str())
    }

    pub(crate) fn print_rename(&mut self, old: &PatchName, new: &PatchName) -> Result<()> {
        self.line('>', None, &format!("{old} -> {new}"))
    }

    pub(crate) fn print_committed(&mut self, patchnames: &[PatchName]) -> Result<()> {
        for patchname in patchnames {
            self.line('C', Some(Color::Green), patchname.as_str())?;
        }
        Ok(())
    }

    pub(crate) fn print_merged(&mut self, patchnames: &[&PatchName]) -> Result<()> {
        for patchname in patchnames {
            self.line('m', Some(Color::Yellow), &format!("{patchname} (merged)"))?;
        }
        Ok(())
    }
}
