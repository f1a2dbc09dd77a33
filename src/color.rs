// SPDX-License-Identifier: GPL-2.0-only

//! Decide whether to emit ANSI color, mirroring `git`'s own `--color=auto`
//! default: color when stdout is a terminal, unless overridden.

use clap::ArgMatches;
use is_terminal::IsTerminal;

pub(crate) fn use_color(matches: &ArgMatches) -> bool {
    match matches.get_one::<String>("color").map(String::as_str) {
        Some("always") => true,
        Some("never") => false,
        _ => std::io::stdout().is_terminal(),
    }
}

pub(crate) fn get_color_stdout(matches: &ArgMatches) -> termcolor::StandardStream {
    let choice = if use_color(matches) {
        termcolor::ColorChoice::Always
    } else {
        termcolor::ColorChoice::Never
    };
    termcolor::StandardStream::stdout(choice)
}
