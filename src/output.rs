// SPDX-License-Identifier: GPL-2.0-only

//! Small helpers for writing colored, aligned status lines
//! (`s patchname`-style, as seen in `stg push`/`stg pop` output).

use std::io::Write;

use anyhow::Result;
use termcolor::{Color, ColorSpec, WriteColor};

pub(crate) fn status_line(
    stream: &mut dyn WriteColor,
    symbol: char,
    color: Option<Color>,
    text: &str,
) -> Result<()> {
    if let Some(color) = color {
        stream.set_color(ColorSpec::new().set_fg(Some(color)))?;
    }
    write!(stream, "{symbol} ")?;
    stream.reset()?;
    writeln!(stream, "{text}")?;
    Ok(())
}
