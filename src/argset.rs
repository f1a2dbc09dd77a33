// SPDX-License-Identifier: GPL-2.0-only

//! Small argument-parsing helpers shared across `cmd/*.rs`.

use clap::{Arg, ArgMatches};

/// Shorthand for reading an optional single string-valued argument.
pub(crate) fn get_one_str<'a>(matches: &'a ArgMatches, id: &str) -> Option<&'a str> {
    matches.get_one::<String>(id).map(String::as_str)
}

/// The `--branch`/`-b` argument every stack-scoped command accepts to
/// operate on a branch other than the current one.
pub(crate) fn branch_arg() -> Arg {
    Arg::new("branch")
        .long("branch")
        .short('b')
        .help("Use <branch> instead of the current branch")
        .value_name("branch")
}

/// The `--color` argument controlling [`crate::color::use_color`].
pub(crate) fn color_arg() -> Arg {
    Arg::new("color")
        .long("color")
        .value_name("when")
        .value_parser(["always", "auto", "never"])
        .help("Whether to colorize output")
}
