// SPDX-License-Identifier: GPL-2.0-only

use anyhow::{Context, Result};

use crate::error::Error;

use super::{series, ParsedPatch};

#[cfg(feature = "import-compressed")]
fn check_safe_path(path: &std::path::Path) -> Result<()> {
    use std::path::Component;
    if path.is_absolute() {
        return Err(Error::UnsafeArchive(path.display().to_string()).into());
    }
    for component in path.components() {
        if matches!(component, Component::ParentDir) {
            return Err(Error::UnsafeArchive(path.display().to_string()).into());
        }
    }
    Ok(())
}

/// Extracts a tar archive to a scratch directory and parses the `series`
/// file it must contain, recursively parsing every entry it references.
/// Entries with absolute paths or `..` components are refused before any
/// extraction happens.
#[cfg(feature = "import-compressed")]
pub(super) fn parse_tar(
    repo: &git_repository::Repository,
    bytes: &[u8],
) -> Result<Vec<ParsedPatch>> {
    let scratch = tempfile::tempdir().context("creating scratch directory for tar import")?;
    let mut series_path = None;

    let mut archive = tar::Archive::new(bytes);
    for entry in archive.entries().context("reading tar archive")? {
        let mut entry = entry.context("reading tar entry")?;
        let path = entry.path().context("reading tar entry path")?.into_owned();
        check_safe_path(&path)?;
        let dest = scratch.path().join(&path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&dest).with_context(|| format!("extracting `{}`", path.display()))?;
        if path.file_name().and_then(|n| n.to_str()) == Some("series") {
            series_path = Some(dest);
        }
    }
    let series_path = series_path
        .ok_or_else(|| anyhow::anyhow!("tar archive does not contain a `series` file"))?;
    let dir = series_path.parent().expect("series file has a parent").to_path_buf();
    let series_bytes = std::fs::read(&series_path)?;
    series::parse_series_bytes(repo, &series_bytes, &dir, None)
}

#[cfg(not(feature = "import-compressed"))]
pub(super) fn parse_tar(
    _repo: &git_repository::Repository,
    _bytes: &[u8],
) -> Result<Vec<ParsedPatch>> {
    anyhow::bail!("tar archive import requires the `import-compressed` feature")
}
