// SPDX-License-Identifier: GPL-2.0-only

//! Parses a blob containing a diff -- optionally wrapped in mail headers,
//! optionally compressed, optionally a mbox/quilt-series/tar archive of the
//! same -- into one or more [`ParsedPatch`] values ready for
//! [`crate::import::ImportEngine`].

mod archive;
mod mail;
mod naming;
mod plain;
mod series;

use std::path::Path;

use anyhow::{Context, Result};

pub(crate) use naming::derive_name;

use crate::{patch::Signature, stupid::StupidExt};

/// What kind of blob [`parse`] is being asked to make sense of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hint {
    PlainDiff,
    Mail,
    Mbox,
    Series,
    Tar,
    /// `bytes` is the URL itself (as UTF-8 text), not the patch content.
    Url,
}

/// One patch extracted from an import source, not yet bound to a final name
/// or committed: naming (§4.D) and commit creation happen in
/// [`crate::import::ImportEngine`].
#[derive(Debug, Clone)]
pub(crate) struct ParsedPatch {
    /// Name suggested by the source itself (a series-file entry, a mail
    /// subject-derived slug, an archive member's basename) -- lower
    /// priority than `--name` but higher than the generic subject heuristic.
    pub(crate) default_name: Option<String>,
    pub(crate) description: String,
    pub(crate) author: Signature,
    pub(crate) diff: Vec<u8>,
    /// `-p<N>` strip level recorded by a quilt series entry; `1` otherwise.
    pub(crate) strip: u32,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BZIP2_MAGIC: [u8; 3] = *b"BZh";

/// Transparently decompresses `bytes` if it looks gzip- or bzip2-wrapped,
/// returning the (possibly unchanged) bytes and, if decompression happened,
/// the extension that should be dropped from a default name derived from
/// the original filename.
fn decompress(bytes: &[u8]) -> Result<(Vec<u8>, Option<&'static str>)> {
    if bytes.starts_with(&GZIP_MAGIC) {
        #[cfg(feature = "import-compressed")]
        {
            use std::io::Read;
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(bytes).read_to_end(&mut out)?;
            return Ok((out, Some(".gz")));
        }
        #[cfg(not(feature = "import-compressed"))]
        anyhow::bail!("gzip-compressed input requires the `import-compressed` feature");
    }
    if bytes.starts_with(&BZIP2_MAGIC) {
        #[cfg(feature = "import-compressed")]
        {
            use std::io::Read;
            let mut out = Vec::new();
            bzip2::read::BzDecoder::new(bytes).read_to_end(&mut out)?;
            return Ok((out, Some(".bz2")));
        }
        #[cfg(not(feature = "import-compressed"))]
        anyhow::bail!("bzip2-compressed input requires the `import-compressed` feature");
    }
    Ok((bytes.to_vec(), None))
}

/// Strips `%XX` percent-escapes from a URL path segment, mirroring Python's
/// `urllib.parse.unquote` well enough for deriving a default patch name.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            let byte = hex.and_then(|h| u8::from_str_radix(h, 16).ok());
            match byte {
                Some(b) => {
                    out.push(b);
                    i += 3;
                    continue;
                }
                None => {}
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Fetches `url`'s body into memory, following redirects, the way the
/// original tool's `__import_url` helper used `urlretrieve`.
#[cfg(feature = "import-url")]
fn fetch_url(url: &str) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut handle = curl::easy::Easy::new();
    handle.url(url)?;
    handle.follow_location(true)?;
    handle.fail_on_error(true)?;
    {
        let mut transfer = handle.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    Ok(body)
}

#[cfg(not(feature = "import-url"))]
fn fetch_url(_url: &str) -> Result<Vec<u8>> {
    anyhow::bail!("URL import requires the `import-url` feature");
}

/// Looks at the first non-blank bytes of a (decompressed) buffer to decide
/// whether it reads as a unified diff with no mail/description preamble.
fn looks_like_bare_diff(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(4096)];
    let text = String::from_utf8_lossy(head);
    match text.lines().next() {
        Some(first) => {
            first.starts_with("diff --git")
                || first.starts_with("Index: ")
                || first.starts_with("--- ")
                || first.starts_with("+++ ")
        }
        None => false,
    }
}

/// Parses `bytes` (the contents of `source_name`, used only to seed a
/// default name and to resolve relative paths in series files) per `hint`,
/// returning one [`ParsedPatch`] per message/series-entry/archive-member.
pub(crate) fn parse(
    repo: &git_repository::Repository,
    bytes: &[u8],
    source_name: Option<&str>,
    hint: Hint,
) -> Result<Vec<ParsedPatch>> {
    let (bytes, dropped_ext) = decompress(bytes)?;
    let default_name = source_name.map(|name| {
        let base = name.rsplit('/').next().unwrap_or(name);
        match dropped_ext {
            Some(ext) => base.strip_suffix(ext).unwrap_or(base).to_string(),
            None => base.to_string(),
        }
    });

    match hint {
        Hint::PlainDiff => Ok(vec![plain::parse_plain(&bytes, default_name)?]),
        Hint::Mail => Ok(vec![mail::parse_mail(
            repo.stupid(),
            &bytes,
            default_name,
        )?]),
        Hint::Mbox => mail::parse_mbox(repo.stupid(), &bytes),
        Hint::Series => series::parse_series_bytes(repo, &bytes, Path::new("."), default_name),
        Hint::Tar => archive::parse_tar(repo, &bytes),
        Hint::Url => {
            let url = std::str::from_utf8(&bytes).context("URL is not valid UTF-8")?;
            let fetched = fetch_url(url)?;
            let name = percent_decode(url.rsplit('/').next().unwrap_or(url));
            let inner_hint = detect_hint(&fetched, Some(&name))?;
            parse(repo, &fetched, Some(&name), inner_hint)
        }
    }
}

/// Best-effort classification when the caller has not specified a hint:
/// sniffs the (decompressed) buffer for diff/mail markers.
pub(crate) fn detect_hint(bytes: &[u8], source_name: Option<&str>) -> Result<Hint> {
    let (bytes, _) = decompress(bytes)?;
    if let Some(name) = source_name {
        if name.ends_with(".tar") || name.ends_with(".tar.gz") || name.ends_with(".tar.bz2") {
            return Ok(Hint::Tar);
        }
        if name.rsplit('/').next() == Some("series") {
            return Ok(Hint::Series);
        }
    }
    if bytes.starts_with(b"From ") || bytes.windows(8).any(|w| w == b"\nSubject") {
        return Ok(Hint::Mail);
    }
    if looks_like_bare_diff(&bytes) {
        return Ok(Hint::PlainDiff);
    }
    // A plain diff preceded by a description and a `---` separator is
    // indistinguishable from a series file by content alone; series files
    // are only ever selected by filename or explicit hint.
    Ok(Hint::PlainDiff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_decode_unescapes_common_sequences() {
        assert_eq!(percent_decode("fix%20thing.patch"), "fix thing.patch");
        assert_eq!(percent_decode("no-escapes"), "no-escapes");
        assert_eq!(percent_decode("100%"), "100%");
    }

    #[test]
    fn detect_hint_prefers_filename_over_content() {
        assert_eq!(
            detect_hint(b"diff --git a b\n", Some("archive.tar.gz")).unwrap(),
            Hint::Tar
        );
        assert_eq!(
            detect_hint(b"patch contents", Some("dir/series")).unwrap(),
            Hint::Series
        );
    }

    #[test]
    fn detect_hint_sniffs_mail_and_diff_markers() {
        assert_eq!(
            detect_hint(b"From someone@example.com Mon Jan 1\nSubject: x\n", None).unwrap(),
            Hint::Mail
        );
        assert_eq!(
            detect_hint(b"diff --git a/x b/x\n--- a/x\n", None).unwrap(),
            Hint::PlainDiff
        );
    }

    #[test]
    fn looks_like_bare_diff_checks_first_line_only() {
        assert!(looks_like_bare_diff(b"--- a/foo\n+++ b/foo\n"));
        assert!(!looks_like_bare_diff(b"Some description\n--- a/foo\n"));
    }
}
