// SPDX-License-Identifier: GPL-2.0-only

//! `pile import` implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, ValueHint};

use crate::{
    argset,
    import::{self, ImportOptions},
    stack::{InitializationPolicy, Stack},
};

pub(super) const STGIT_COMMAND: super::StGitCommand = super::StGitCommand {
    name: "import",
    make,
    run,
};

fn make() -> clap::Command {
    clap::Command::new(STGIT_COMMAND.name)
        .about("Import patch(es) from a diff, mail, mbox, series, or tar archive")
        .arg(
            Arg::new("file")
                .help("File to import (reads stdin if omitted)")
                .value_name("file")
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .short('n')
                .help("Use <name> for the imported patch")
                .value_name("name"),
        )
        .arg(
            Arg::new("series")
                .long("series")
                .short('s')
                .help("Import a quilt series file")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("mail")
                .long("mail")
                .short('m')
                .help("Import a single mail message")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with("series"),
        )
        .arg(
            Arg::new("mbox")
                .long("mbox")
                .help("Import an mbox of mail messages")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with_all(["series", "mail"]),
        )
        .arg(
            Arg::new("url")
                .long("url")
                .short('u')
                .help("Import a patch fetched from a URL")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with_all(["series", "mail", "mbox"]),
        )
        .arg(
            Arg::new("stripname")
                .long("stripname")
                .help("Strip leading numbers and trailing extension from patch names")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ignore")
                .long("ignore")
                .help("Ignore patches whose name already exists")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with("replace"),
        )
        .arg(
            Arg::new("replace")
                .long("replace")
                .help("Replace existing patches with the same name")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("reject")
                .long("reject")
                .help("Leave `.rej` files for hunks that fail to apply")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("edit")
                .long("edit")
                .short('e')
                .help("Invoke the editor on each imported patch's description")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(argset::branch_arg())
}

fn run(matches: &ArgMatches) -> Result<()> {
    let repo = git_repository::Repository::open()?;
    let stack = Stack::from_branch(
        &repo,
        argset::get_one_str(matches, "branch"),
        InitializationPolicy::AutoInitialize,
    )?;

    let path = matches.get_one::<PathBuf>("file");

    let (bytes, source_name, hint) = if matches.get_flag("url") {
        let url = path
            .context("URL argument required with --url")?
            .to_str()
            .context("URL must be valid UTF-8")?;
        (url.as_bytes().to_vec(), None, Some(crate::parser::Hint::Url))
    } else {
        let bytes = match path {
            Some(path) => {
                std::fs::read(path).with_context(|| format!("reading `{}`", path.display()))?
            }
            None => {
                use std::io::Read;
                let mut buf = Vec::new();
                std::io::stdin()
                    .read_to_end(&mut buf)
                    .context("reading patch from stdin")?;
                buf
            }
        };
        let source_name = path
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(str::to_string);
        let hint = if matches.get_flag("series") {
            Some(crate::parser::Hint::Series)
        } else if matches.get_flag("mail") {
            Some(crate::parser::Hint::Mail)
        } else if matches.get_flag("mbox") {
            Some(crate::parser::Hint::Mbox)
        } else {
            None
        };
        (bytes, source_name, hint)
    };

    let options = ImportOptions {
        name: argset::get_one_str(matches, "name").map(str::to_string),
        stripname: matches.get_flag("stripname"),
        ignore: matches.get_flag("ignore"),
        replace: matches.get_flag("replace"),
        reject: matches.get_flag("reject"),
        edit: matches.get_flag("edit"),
        ..Default::default()
    };

    import::import(
        &repo,
        stack,
        &bytes,
        source_name.as_deref(),
        hint,
        &options,
    )?;
    Ok(())
}
