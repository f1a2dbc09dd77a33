// SPDX-License-Identifier: GPL-2.0-only

//! Subcommand registry: each module exposes a `STGIT_COMMAND` constant
//! pairing a `clap::Command` builder with a `run()` entry point, following
//! the reference crate's `cmd/*.rs` shape.

mod branch;
mod delete;
mod diff;
mod files;
mod hide;
mod import;
mod init;
mod new;
mod pop;
mod push;
mod refresh;
mod rename;
mod series;
mod unhide;

pub(crate) struct StGitCommand {
    pub(crate) name: &'static str,
    pub(crate) make: fn() -> clap::Command,
    pub(crate) run: fn(&clap::ArgMatches) -> anyhow::Result<()>,
}

pub(crate) const COMMANDS: &[StGitCommand] = &[
    init::STGIT_COMMAND,
    branch::STGIT_COMMAND,
    new::STGIT_COMMAND,
    push::STGIT_COMMAND,
    pop::STGIT_COMMAND,
    refresh::STGIT_COMMAND,
    series::STGIT_COMMAND,
    delete::STGIT_COMMAND,
    rename::STGIT_COMMAND,
    hide::STGIT_COMMAND,
    unhide::STGIT_COMMAND,
    import::STGIT_COMMAND,
    diff::STGIT_COMMAND,
    files::STGIT_COMMAND,
];

pub(crate) fn get(name: &str) -> Option<&'static StGitCommand> {
    COMMANDS.iter().find(|cmd| cmd.name == name)
}
