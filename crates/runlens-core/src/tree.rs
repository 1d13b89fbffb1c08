use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::path_safety;

pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// Directory names starting with this marker are never listed.
const VCS_MARKER: &str = ".git";

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FsError {
    #[error("unsafe path: {0}")]
    UnsafePath(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    /// Path relative to the walker base; the base itself is `"."`.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Present for files; `None` for directories and when the size lookup fails.
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeResult {
    pub root: String,
    pub entries: Vec<TreeEntry>,
    pub truncated: bool,
    pub error: Option<FsError>,
}

impl TreeResult {
    fn failed(root: &str, error: FsError) -> Self {
        Self {
            root: root.to_string(),
            entries: Vec::new(),
            truncated: false,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeLimits {
    pub max_depth: usize,
    pub max_entries: usize,
}

impl Default for TreeLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Bounded, read-only listing of the tree under a fixed base directory.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    base: PathBuf,
}

impl TreeWalker {
    pub fn new(base: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            base: base.as_ref().canonicalize()?,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Lists `path` (relative to the base) depth-first in lexical order.
    ///
    /// The target sits at depth 0. Directories at `max_depth` are listed but
    /// not descended. Directories count towards `max_entries`, and the walk
    /// stops at the first entry that would exceed it.
    pub fn walk(&self, path: &str, limits: TreeLimits) -> TreeResult {
        if !path_safety::is_safe(&self.base, path) {
            tracing::warn!(path, "tree request refused");
            return TreeResult::failed(path, FsError::UnsafePath(path.to_string()));
        }

        let target = self.base.join(path);
        match fs::metadata(&target) {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                return TreeResult::failed(path, FsError::PermissionDenied(path.to_string()));
            }
            Err(_) => return TreeResult::failed(path, FsError::NotFound(path.to_string())),
        }

        let mut walk = Walk {
            base: &self.base,
            limits,
            entries: Vec::new(),
            truncated: false,
        };
        let error = walk.visit(&target, 0).err();
        TreeResult {
            root: path.to_string(),
            entries: walk.entries,
            truncated: walk.truncated,
            error,
        }
    }
}

struct Walk<'a> {
    base: &'a Path,
    limits: TreeLimits,
    entries: Vec<TreeEntry>,
    truncated: bool,
}

impl Walk<'_> {
    fn visit(&mut self, path: &Path, depth: usize) -> Result<(), FsError> {
        if depth > self.limits.max_depth || self.truncated {
            return Ok(());
        }

        if path.is_file() {
            let size = fs::metadata(path).ok().map(|meta| meta.len());
            self.push(path, EntryKind::File, size);
            return Ok(());
        }
        if !path.is_dir() {
            return Ok(());
        }
        if !self.push(path, EntryKind::Directory, None) {
            return Ok(());
        }
        if depth == self.limits.max_depth {
            return Ok(());
        }
        // Linked directories below the target are shown but not entered.
        if depth > 0 && path.is_symlink() {
            return Ok(());
        }

        let listing = match fs::read_dir(path) {
            Ok(listing) => listing,
            Err(err) if depth == 0 && err.kind() == io::ErrorKind::PermissionDenied => {
                return Err(FsError::PermissionDenied(self.relative(path)));
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "skipping unreadable directory");
                return Ok(());
            }
        };

        let mut children: Vec<PathBuf> = listing
            .filter_map(Result::ok)
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with(VCS_MARKER))
            .map(|entry| entry.path())
            .collect();
        children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        for child in children {
            self.visit(&child, depth + 1)?;
            if self.truncated {
                break;
            }
        }
        Ok(())
    }

    fn push(&mut self, path: &Path, kind: EntryKind, size: Option<u64>) -> bool {
        if self.entries.len() >= self.limits.max_entries {
            self.truncated = true;
            return false;
        }
        self.entries.push(TreeEntry {
            path: self.relative(path),
            kind,
            size,
        });
        true
    }

    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(self.base).unwrap_or(path);
        let text = rel.to_string_lossy();
        if text.is_empty() {
            ".".to_string()
        } else {
            text.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    fn touch(path: &Path, body: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, body).expect("write");
    }

    fn paths(result: &TreeResult) -> Vec<&str> {
        result.entries.iter().map(|entry| entry.path.as_str()).collect()
    }

    #[test]
    fn lists_base_depth_first_in_lexical_order() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("b.txt"), "bb");
        touch(&dir.path().join("a/z.rs"), "z");
        touch(&dir.path().join("a/m.rs"), "mmm");

        let walker = TreeWalker::new(dir.path()).expect("walker");
        let result = walker.walk(".", TreeLimits::default());

        assert_eq!(result.error, None);
        assert!(!result.truncated);
        assert_eq!(paths(&result), vec![".", "a", "a/m.rs", "a/z.rs", "b.txt"]);
        assert_eq!(result.entries[0].kind, EntryKind::Directory);
        assert_eq!(result.entries[0].size, None);
        assert_eq!(result.entries[2].kind, EntryKind::File);
        assert_eq!(result.entries[2].size, Some(3));
    }

    #[test]
    fn file_target_yields_single_entry() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("notes.md"), "hello");

        let walker = TreeWalker::new(dir.path()).expect("walker");
        let result = walker.walk("notes.md", TreeLimits::default());

        assert_eq!(
            result.entries,
            vec![TreeEntry {
                path: "notes.md".to_string(),
                kind: EntryKind::File,
                size: Some(5),
            }]
        );
    }

    #[test]
    fn skips_version_control_entries() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join(".git/HEAD"), "ref");
        touch(&dir.path().join(".gitignore"), "target");
        touch(&dir.path().join("src/lib.rs"), "");

        let walker = TreeWalker::new(dir.path()).expect("walker");
        let result = walker.walk(".", TreeLimits::default());

        assert_eq!(paths(&result), vec![".", "src", "src/lib.rs"]);
    }

    #[test]
    fn depth_limit_lists_but_does_not_descend() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("one/two/three/deep.txt"), "x");

        let walker = TreeWalker::new(dir.path()).expect("walker");
        let result = walker.walk(
            ".",
            TreeLimits {
                max_depth: 2,
                max_entries: 100,
            },
        );

        assert_eq!(paths(&result), vec![".", "one", "one/two"]);
        assert!(!result.truncated);
    }

    #[test]
    fn depth_zero_returns_only_the_target() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("src/lib.rs"), "");

        let walker = TreeWalker::new(dir.path()).expect("walker");
        let result = walker.walk(
            "src",
            TreeLimits {
                max_depth: 0,
                max_entries: 10,
            },
        );
        assert_eq!(paths(&result), vec!["src"]);
    }

    #[test]
    fn truncates_when_more_entries_exist() {
        let dir = tempdir().expect("tempdir");
        for i in 0..10 {
            touch(&dir.path().join(format!("f{i}.txt")), "");
        }

        let walker = TreeWalker::new(dir.path()).expect("walker");
        let result = walker.walk(
            ".",
            TreeLimits {
                max_depth: 3,
                max_entries: 5,
            },
        );

        assert_eq!(result.entries.len(), 5);
        assert!(result.truncated);
        assert_eq!(paths(&result), vec![".", "f0.txt", "f1.txt", "f2.txt", "f3.txt"]);
    }

    #[test]
    fn exact_fit_is_not_truncated() {
        let dir = tempdir().expect("tempdir");
        for i in 0..4 {
            touch(&dir.path().join(format!("f{i}.txt")), "");
        }

        let walker = TreeWalker::new(dir.path()).expect("walker");
        let result = walker.walk(
            ".",
            TreeLimits {
                max_depth: 3,
                max_entries: 5,
            },
        );

        assert_eq!(result.entries.len(), 5);
        assert!(!result.truncated);
    }

    #[test]
    fn unsafe_request_returns_error_and_no_entries() {
        let dir = tempdir().expect("tempdir");
        let walker = TreeWalker::new(dir.path()).expect("walker");

        for candidate in ["/etc", "../", "/home/someone"] {
            let result = walker.walk(candidate, TreeLimits::default());
            assert_eq!(result.error, Some(FsError::UnsafePath(candidate.to_string())));
            assert!(result.entries.is_empty());
            assert!(result.error.as_ref().map(ToString::to_string).unwrap_or_default().contains("unsafe"));
        }
    }

    #[test]
    fn missing_path_reports_not_found() {
        let dir = tempdir().expect("tempdir");
        let walker = TreeWalker::new(dir.path()).expect("walker");

        let result = walker.walk("no/such/dir", TreeLimits::default());

        assert!(result.entries.is_empty());
        let message = result.error.map(|err| err.to_string()).unwrap_or_default();
        assert!(message.contains("not found"), "{message}");
    }

    #[cfg(unix)]
    #[test]
    fn linked_directories_are_listed_without_descending() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("real/inner.txt"), "");
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).expect("symlink");

        let walker = TreeWalker::new(dir.path()).expect("walker");
        let result = walker.walk(".", TreeLimits::default());

        assert_eq!(paths(&result), vec![".", "alias", "real", "real/inner.txt"]);
    }

    /// Strips all permissions from `dir`. Returns false when the process can
    /// still read it anyway, as root can.
    #[cfg(unix)]
    fn lock(dir: &Path) -> bool {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o000)).expect("chmod");
        fs::read_dir(dir).is_err()
    }

    #[cfg(unix)]
    fn unlock(dir: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_target_reports_permission_denied_with_partial_listing() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("locked/secret.txt"), "s");
        let locked = dir.path().join("locked");
        let walker = TreeWalker::new(dir.path()).expect("walker");

        let readable = !lock(&locked);
        let result = walker.walk("locked", TreeLimits::default());
        unlock(&locked);
        if readable {
            return;
        }

        assert_eq!(paths(&result), vec!["locked"]);
        assert_eq!(result.error, Some(FsError::PermissionDenied("locked".to_string())));
        assert!(result
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
            .contains("permission denied"));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_nested_directory_is_skipped() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("locked/secret.txt"), "s");
        touch(&dir.path().join("open.txt"), "o");
        let locked = dir.path().join("locked");
        let walker = TreeWalker::new(dir.path()).expect("walker");

        let readable = !lock(&locked);
        let result = walker.walk(".", TreeLimits::default());
        unlock(&locked);
        if readable {
            return;
        }

        assert_eq!(result.error, None);
        assert_eq!(paths(&result), vec![".", "locked", "open.txt"]);
    }

    #[test]
    fn entries_serialize_with_type_field() {
        let entry = TreeEntry {
            path: "src".to_string(),
            kind: EntryKind::Directory,
            size: None,
        };
        let value = serde_json::to_value(&entry).expect("json");
        assert_eq!(
            value,
            serde_json::json!({"path": "src", "type": "directory", "size": null})
        );
    }
}
