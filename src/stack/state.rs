// SPDX-License-Identifier: GPL-2.0-only

//! File-based on-disk representation of one branch's patch stack.
//!
//! This mirrors the original tool's plain-text layout rather than the
//! tree-encoded state more recent forks adopted: a handful of newline-
//! delimited list files plus one directory per patch under the repository's
//! control directory (`$GIT_DIR/patches/<branch>/...`).

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use git_repository::ObjectId;

use crate::{
    error::Error,
    git::GitBackend,
    patch::{PatchName, PatchRecord, Signature},
};

pub(crate) struct StackState {
    pub(crate) branch: String,
    pub(crate) base: ObjectId,
    pub(crate) applied: Vec<PatchName>,
    pub(crate) unapplied: Vec<PatchName>,
    pub(crate) hidden: Vec<PatchName>,
    pub(crate) patches: BTreeMap<PatchName, PatchRecord>,
    pub(crate) description: String,
    pub(crate) protected: bool,
}

impl StackState {
    pub(crate) fn current(&self) -> Option<&PatchName> {
        self.applied.last()
    }

    pub(crate) fn is_applied(&self, name: &PatchName) -> bool {
        self.applied.contains(name)
    }

    pub(crate) fn is_unapplied(&self, name: &PatchName) -> bool {
        self.unapplied.contains(name)
    }

    pub(crate) fn is_hidden(&self, name: &PatchName) -> bool {
        self.hidden.contains(name)
    }

    pub(crate) fn position_applied(&self, name: &PatchName) -> Option<usize> {
        self.applied.iter().position(|n| n == name)
    }

    pub(crate) fn has_patch(&self, name: &PatchName) -> bool {
        self.patches.contains_key(name)
    }

    pub(crate) fn get_patch(&self, name: &PatchName) -> Result<&PatchRecord> {
        self.patches
            .get(name)
            .ok_or_else(|| Error::UnknownPatch(name.to_string()).into())
    }

    pub(crate) fn all_names(&self) -> impl Iterator<Item = &PatchName> {
        self.applied
            .iter()
            .chain(self.unapplied.iter())
            .chain(self.hidden.iter())
    }

    /// A digest of everything a concurrent writer could change: the three
    /// list orderings, `base`, and every patch's boundaries. Two states with
    /// the same digest are indistinguishable from this transaction's point
    /// of view, even if per-patch metadata untouched by list membership
    /// (description text, author) differs -- such a write could only have
    /// come from an operation already serialized behind the stack lock.
    pub(crate) fn digest(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.base.hash(&mut hasher);
        self.applied.hash(&mut hasher);
        self.unapplied.hash(&mut hasher);
        self.hidden.hash(&mut hasher);
        for name in self.all_names() {
            let record = &self.patches[name];
            record.bottom.hash(&mut hasher);
            record.top.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Validates the §3 structural invariants. Only ever called on staged
    /// state just before a transaction commits; a violation here is a bug in
    /// the engine, not a user-facing error.
    pub(crate) fn assert_invariants(&self) {
        let mut seen = std::collections::HashSet::new();
        for name in self.all_names() {
            assert!(seen.insert(name), "patch `{name}` listed more than once");
        }
        assert_eq!(
            seen.len(),
            self.patches.len(),
            "patches map does not match applied/unapplied/hidden union"
        );
        let mut prev_top = self.base;
        for name in &self.applied {
            let patch = &self.patches[name];
            assert_eq!(
                patch.bottom, prev_top,
                "patch `{name}` bottom does not chain from previous top"
            );
            prev_top = patch.top;
        }
        match self.current() {
            Some(name) => assert_eq!(Some(name), self.applied.last()),
            None => assert!(self.applied.is_empty()),
        }
    }
}

/// Directory holding all StGit state for `branch` under the repository's
/// control directory.
pub(crate) fn branch_dir(repo: &git_repository::Repository, branch: &str) -> PathBuf {
    repo.git_dir().join("patches").join(branch)
}

fn patches_dir(repo: &git_repository::Repository, branch: &str) -> PathBuf {
    branch_dir(repo, branch).join("patches")
}

fn patch_dir(repo: &git_repository::Repository, branch: &str, name: &PatchName) -> PathBuf {
    patches_dir(repo, branch).join(name.as_str())
}

pub(crate) fn base_refname(branch: &str) -> String {
    format!("refs/bases/{branch}")
}

pub(crate) fn patch_refname(branch: &str, name: &str) -> String {
    format!("refs/patches/{branch}/{name}")
}

/// Whether `branch` has StGit state on disk at all.
pub(crate) fn is_initialized(repo: &git_repository::Repository, branch: &str) -> bool {
    branch_dir(repo, branch).join("applied").is_file()
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().expect("path has parent");
    fs::create_dir_all(dir)?;
    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating scratch file in {}", dir.display()))?;
    temp.write_all(contents)?;
    temp.persist(path)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

fn read_list(path: &Path) -> Result<Vec<PatchName>> {
    match fs::read_to_string(path) {
        Ok(contents) => contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| PatchName::from_str(line).map_err(Into::into))
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn write_list(path: &Path, names: &[PatchName]) -> Result<()> {
    let mut contents = String::new();
    for name in names {
        contents.push_str(name.as_str());
        contents.push('\n');
    }
    write_atomic(path, contents.as_bytes())
}

fn read_single_line(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let trimmed = contents.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_oid(path: &Path) -> Result<Option<ObjectId>> {
    match read_single_line(path)? {
        Some(hex) => Ok(Some(ObjectId::from_hex(hex.as_bytes())?)),
        None => Ok(None),
    }
}

fn write_oid(path: &Path, id: ObjectId) -> Result<()> {
    write_atomic(path, format!("{id}\n").as_bytes())
}

fn read_patch_record(dir: &Path) -> Result<PatchRecord> {
    let bottom = read_oid(&dir.join("bottom"))?
        .ok_or_else(|| anyhow::anyhow!("missing bottom file in {}", dir.display()))?;
    let top = read_oid(&dir.join("top"))?
        .ok_or_else(|| anyhow::anyhow!("missing top file in {}", dir.display()))?;
    let old_bottom = read_oid(&dir.join("bottom.old"))?;
    let old_top = read_oid(&dir.join("top.old"))?;
    let description = fs::read_to_string(dir.join("description")).unwrap_or_default();
    let author = Signature {
        name: read_single_line(&dir.join("authname"))?.unwrap_or_default(),
        email: read_single_line(&dir.join("authemail"))?.unwrap_or_default(),
        date: read_single_line(&dir.join("authdate"))?.unwrap_or_default(),
    };
    let committer = Signature {
        name: read_single_line(&dir.join("commname"))?.unwrap_or_default(),
        email: read_single_line(&dir.join("commemail"))?.unwrap_or_default(),
        date: read_single_line(&dir.join("authdate"))?.unwrap_or_default(),
    };
    Ok(PatchRecord {
        bottom,
        top,
        old_bottom,
        old_top,
        description,
        author,
        committer,
    })
}

fn write_patch_record(dir: &Path, record: &PatchRecord) -> Result<()> {
    fs::create_dir_all(dir)?;
    write_oid(&dir.join("bottom"), record.bottom)?;
    write_oid(&dir.join("top"), record.top)?;
    if let Some(old_bottom) = record.old_bottom {
        write_oid(&dir.join("bottom.old"), old_bottom)?;
    } else {
        let _ = fs::remove_file(dir.join("bottom.old"));
    }
    if let Some(old_top) = record.old_top {
        write_oid(&dir.join("top.old"), old_top)?;
    } else {
        let _ = fs::remove_file(dir.join("top.old"));
    }
    write_atomic(&dir.join("description"), record.description.as_bytes())?;
    write_atomic(&dir.join("authname"), record.author.name.as_bytes())?;
    write_atomic(&dir.join("authemail"), record.author.email.as_bytes())?;
    write_atomic(&dir.join("authdate"), record.author.date.as_bytes())?;
    write_atomic(&dir.join("commname"), record.committer.name.as_bytes())?;
    write_atomic(&dir.join("commemail"), record.committer.email.as_bytes())?;
    Ok(())
}

/// Loads the state for `branch`, or `None` if the branch has never been
/// initialized.
pub(crate) fn load(repo: &git_repository::Repository, branch: &str) -> Result<Option<StackState>> {
    if !is_initialized(repo, branch) {
        return Ok(None);
    }
    let dir = branch_dir(repo, branch);
    let applied = read_list(&dir.join("applied"))?;
    let unapplied = read_list(&dir.join("unapplied"))?;
    let hidden = read_list(&dir.join("hidden"))?;
    let description = fs::read_to_string(dir.join("description")).unwrap_or_default();
    let protected = dir.join("protected").is_file();
    let base = read_oid(&dir.join("base"))?
        .or(resolve_base_ref(repo, branch)?)
        .ok_or_else(|| anyhow::anyhow!("no base recorded for branch `{branch}`"))?;

    let mut patches = BTreeMap::new();
    for name in applied.iter().chain(unapplied.iter()).chain(hidden.iter()) {
        let record = read_patch_record(&patch_dir(repo, branch, name))
            .with_context(|| format!("reading patch `{name}`"))?;
        patches.insert(name.clone(), record);
    }

    Ok(Some(StackState {
        branch: branch.to_string(),
        base,
        applied,
        unapplied,
        hidden,
        patches,
        description,
        protected,
    }))
}

fn resolve_base_ref(repo: &git_repository::Repository, branch: &str) -> Result<Option<ObjectId>> {
    match repo.try_find_reference(&base_refname(branch))? {
        Some(mut r) => Ok(Some(r.peel_to_id_in_place()?.detach())),
        None => Ok(None),
    }
}

/// Creates a fresh, empty state at `head`, without yet persisting it.
pub(crate) fn new_at(branch: &str, head: ObjectId) -> StackState {
    StackState {
        branch: branch.to_string(),
        base: head,
        applied: Vec::new(),
        unapplied: Vec::new(),
        hidden: Vec::new(),
        patches: BTreeMap::new(),
        description: String::new(),
        protected: false,
    }
}

/// Persists `state` in full: every list file, every patch directory still
/// referenced, the `base`/patch refs, and removes directories for patches no
/// longer present. `touched` restricts per-patch metadata writes to patches
/// that actually changed in this transaction (an optimization; correctness
/// does not depend on it since the content written is idempotent).
pub(crate) fn save(
    repo: &git_repository::Repository,
    state: &StackState,
    touched: &std::collections::HashSet<PatchName>,
    removed: &[PatchName],
) -> Result<()> {
    let dir = branch_dir(repo, &state.branch);
    fs::create_dir_all(&dir)?;

    for name in touched {
        if let Some(record) = state.patches.get(name) {
            write_patch_record(&patch_dir(repo, &state.branch, name), record)
                .with_context(|| format!("writing patch `{name}`"))?;
            let refname = patch_refname(&state.branch, name.as_str());
            update_patch_ref(repo, &refname, record.top)
                .with_context(|| format!("updating ref for patch `{name}`"))?;
        }
    }

    for name in removed {
        let _ = fs::remove_dir_all(patch_dir(repo, &state.branch, name));
        let refname = patch_refname(&state.branch, name.as_str());
        let _ = repo.delete_ref(&refname);
    }

    write_list(&dir.join("applied"), &state.applied)?;
    write_list(&dir.join("unapplied"), &state.unapplied)?;
    write_list(&dir.join("hidden"), &state.hidden)?;
    write_atomic(
        &dir.join("current"),
        state
            .current()
            .map(|n| n.as_str())
            .unwrap_or("")
            .as_bytes(),
    )?;
    write_atomic(&dir.join("description"), state.description.as_bytes())?;
    if state.protected {
        write_atomic(&dir.join("protected"), b"")?;
    } else {
        let _ = fs::remove_file(dir.join("protected"));
    }
    write_oid(&dir.join("base"), state.base)?;
    update_patch_ref(repo, &base_refname(&state.branch), state.base)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(byte: u8) -> ObjectId {
        let hex: String = std::iter::repeat(format!("{byte:02x}")).take(20).collect();
        ObjectId::from_hex(hex.as_bytes()).unwrap()
    }

    fn name(s: &str) -> PatchName {
        PatchName::from_str(s).unwrap()
    }

    #[test]
    fn list_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("applied");
        let names = vec![name("alpha"), name("beta")];
        write_list(&path, &names).unwrap();
        assert_eq!(read_list(&path).unwrap(), names);
    }

    #[test]
    fn missing_list_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unapplied");
        assert!(read_list(&path).unwrap().is_empty());
    }

    #[test]
    fn oid_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("base");
        let id = oid(0xab);
        write_oid(&path, id).unwrap();
        assert_eq!(read_oid(&path).unwrap(), Some(id));
    }

    #[test]
    fn missing_oid_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_oid(&dir.path().join("base")).unwrap(), None);
    }

    #[test]
    fn current_is_the_top_of_applied() {
        let mut state = new_at("master", oid(0x01));
        assert_eq!(state.current(), None);
        state.applied.push(name("one"));
        state.applied.push(name("two"));
        assert_eq!(state.current(), Some(&name("two")));
    }

    #[test]
    fn membership_queries_match_their_list() {
        let mut state = new_at("master", oid(0x01));
        state.applied.push(name("one"));
        state.unapplied.push(name("two"));
        state.hidden.push(name("three"));

        assert!(state.is_applied(&name("one")));
        assert!(state.is_unapplied(&name("two")));
        assert!(state.is_hidden(&name("three")));
        assert!(!state.is_applied(&name("two")));
        assert_eq!(state.position_applied(&name("one")), Some(0));
        assert_eq!(
            state.all_names().cloned().collect::<Vec<_>>(),
            vec![name("one"), name("two"), name("three")]
        );
    }

    #[test]
    fn unknown_patch_is_an_error() {
        let state = new_at("master", oid(0x01));
        assert!(state.get_patch(&name("nope")).is_err());
    }

    #[test]
    fn digest_changes_when_a_patch_is_pushed() {
        let base = oid(0x00);
        let mut state = new_at("master", base);
        let before = state.digest();
        let record = PatchRecord::new(
            base,
            oid(0x01),
            "desc".to_string(),
            Signature {
                name: "A".into(),
                email: "a@example.com".into(),
                date: "0 +0000".into(),
            },
            Signature {
                name: "C".into(),
                email: "c@example.com".into(),
                date: "0 +0000".into(),
            },
        );
        state.patches.insert(name("one"), record);
        state.applied.push(name("one"));
        assert_ne!(before, state.digest());
    }

    #[test]
    fn digest_is_stable_for_equivalent_state() {
        let base = oid(0x00);
        let a = new_at("master", base);
        let b = new_at("master", base);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn assert_invariants_accepts_a_consistent_chain() {
        let base = oid(0x00);
        let mut state = new_at("master", base);
        let record = PatchRecord::new(
            base,
            oid(0x01),
            "desc".to_string(),
            Signature {
                name: "A".into(),
                email: "a@example.com".into(),
                date: "0 +0000".into(),
            },
            Signature {
                name: "C".into(),
                email: "c@example.com".into(),
                date: "0 +0000".into(),
            },
        );
        state.patches.insert(name("one"), record);
        state.applied.push(name("one"));
        state.assert_invariants();
    }

    #[test]
    #[should_panic(expected = "bottom does not chain")]
    fn assert_invariants_rejects_a_broken_chain() {
        let base = oid(0x00);
        let mut state = new_at("master", base);
        let record = PatchRecord::new(
            oid(0x99),
            oid(0x01),
            "desc".to_string(),
            Signature {
                name: "A".into(),
                email: "a@example.com".into(),
                date: "0 +0000".into(),
            },
            Signature {
                name: "C".into(),
                email: "c@example.com".into(),
                date: "0 +0000".into(),
            },
        );
        state.patches.insert(name("one"), record);
        state.applied.push(name("one"));
        state.assert_invariants();
    }
}

fn update_patch_ref(
    repo: &git_repository::Repository,
    refname: &str,
    id: ObjectId,
) -> Result<()> {
    use git_repository::refs::transaction::{Change, LogChange, PreviousValue, RefEdit, RefLog};
    repo.edit_reference(RefEdit {
        change: Change::Update {
            log: LogChange {
                mode: RefLog::AndReference,
                force_create_reflog: false,
                message: "stack update".into(),
            },
            expected: PreviousValue::Any,
            new: git_repository::refs::Target::Peeled(id),
        },
        name: git_repository::refs::FullName::try_from(refname)?,
        deref: false,
    })?;
    Ok(())
}
