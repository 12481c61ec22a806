//! Project directory scanning.
//!
//! Built on `walkdir`, which bounds the number of directory handles held
//! open at once, so wide trees scan as reliably as deep ones. Output order
//! is stable across repeated scans of the same tree: text sources first,
//! then assets, each sorted by relative path.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use super::FileKind;
use crate::config::AgentConfig;
use crate::log;

/// A recognized file found under the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFile {
    pub absolute: PathBuf,
    /// Forward-slash separated path relative to the project root.
    pub relative: String,
    pub kind: FileKind,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot read project directory `{}`", .0.display())]
    RootInaccessible(PathBuf, #[source] io::Error),
    #[error("cannot scan `{}`", .0.display())]
    Walk(PathBuf, #[source] walkdir::Error),
}

/// Which parts of the tree belong to the project.
#[derive(Debug, Clone)]
pub struct ScanRules {
    /// Directory names skipped in addition to dot-directories.
    ignore_dirs: Vec<String>,
    /// Relative path of the compiled artifact (never a source input).
    output: String,
}

impl ScanRules {
    pub fn new(ignore_dirs: Vec<String>, output: impl Into<String>) -> Self {
        Self {
            ignore_dirs,
            output: output.into(),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.sync.ignore.clone(), config.sync.output.clone())
    }

    fn skips_dir(&self, name: &str) -> bool {
        name.starts_with('.') || self.ignore_dirs.iter().any(|d| d == name)
    }

    fn accepts_file(&self, relative: &str) -> Option<FileKind> {
        if relative == self.output {
            return None;
        }
        FileKind::from_path(Path::new(relative))
    }

    /// Whether a change at `path` could alter the next sync payload.
    ///
    /// Used by the watcher to filter raw events before triggering a sync.
    pub fn is_relevant(&self, root: &Path, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(root) else {
            return false;
        };

        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(name) => parts.push(name.to_string_lossy()),
                _ => return false,
            }
        }
        let Some((_file, dirs)) = parts.split_last() else {
            return false;
        };
        if dirs.iter().any(|d| self.skips_dir(d)) {
            return false;
        }

        self.accepts_file(&parts.join("/")).is_some()
    }
}

/// Walk `root` and return every recognized project file.
///
/// A subdirectory that is unreadable or vanished mid-walk is skipped with a
/// warning. Any other I/O failure (running out of file handles, say) fails
/// the scan so a partial tree is never sent.
pub fn scan_project(root: &Path, rules: &ScanRules) -> Result<Vec<ProjectFile>, ScanError> {
    fs::read_dir(root).map_err(|e| ScanError::RootInaccessible(root.to_path_buf(), e))?;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry, rules));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if is_skippable(&e) => {
                let path = e.path().unwrap_or(root);
                log!("scan"; "skipping unreadable directory {}: {}", path.display(), e);
                continue;
            }
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                return Err(ScanError::Walk(path, e));
            }
        };

        // Symlinked files count; symlinked directories are not followed.
        let file_type = entry.file_type();
        let is_file = file_type.is_file()
            || (file_type.is_symlink() && fs::metadata(entry.path()).is_ok_and(|m| m.is_file()));
        if !is_file {
            continue;
        }

        let Some(relative) = relative_path(root, entry.path()) else {
            continue;
        };
        if let Some(kind) = rules.accepts_file(&relative) {
            files.push(ProjectFile {
                absolute: entry.into_path(),
                relative,
                kind,
            });
        }
    }

    files.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.relative.cmp(&b.relative)));
    Ok(files)
}

fn is_skipped_dir(entry: &DirEntry, rules: &ScanRules) -> bool {
    entry.file_type().is_dir() && rules.skips_dir(&entry.file_name().to_string_lossy())
}

fn is_skippable(e: &walkdir::Error) -> bool {
    e.io_error().is_some_and(|io| {
        matches!(
            io.kind(),
            io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound
        )
    })
}

/// Forward-slash form of `path` relative to `root`.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rules() -> ScanRules {
        ScanRules::new(vec!["node_modules".into()], "output.pdf")
    }

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn relatives(files: &[ProjectFile]) -> Vec<&str> {
        files.iter().map(|f| f.relative.as_str()).collect()
    }

    #[test]
    fn test_scan_filters_and_orders() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "main.tex", b"\\documentclass{article}");
        write(root, "chapters/intro.tex", b"intro");
        write(root, "refs.bib", b"@book{}");
        write(root, "figures/plot.png", &[0x89, 0x50]);
        write(root, "notes.md", b"not a source");
        write(root, "output.pdf", b"%PDF");
        write(root, ".git/config.tex", b"hidden");
        write(root, "node_modules/pkg/x.sty", b"dependency");

        let files = scan_project(root, &rules()).unwrap();
        assert_eq!(
            relatives(&files),
            vec!["chapters/intro.tex", "main.tex", "refs.bib", "figures/plot.png"]
        );
        assert_eq!(files[3].kind, FileKind::Binary);
        assert_eq!(files[3].absolute, root.join("figures").join("plot.png"));
    }

    #[test]
    fn test_scan_is_stable() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for i in 0..20 {
            write(root, &format!("d{}/f{}.tex", i % 3, i), b"x");
            write(root, &format!("img/{i}.jpg"), b"y");
        }

        let first = scan_project(root, &rules()).unwrap();
        let second = scan_project(root, &rules()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 40);
    }

    #[test]
    fn test_nested_output_name_is_a_source() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "figures/output.pdf", b"%PDF");

        let files = scan_project(dir.path(), &rules()).unwrap();
        assert_eq!(relatives(&files), vec!["figures/output.pdf"]);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = scan_project(&missing, &rules()).unwrap_err();
        assert!(matches!(err, ScanError::RootInaccessible(ref p, _) if p == &missing));
    }

    #[test]
    fn test_deep_tree() {
        let dir = TempDir::new().unwrap();
        let mut rel = String::new();
        for i in 0..64 {
            rel.push_str(&format!("d{i}/"));
        }
        rel.push_str("deep.tex");
        write(dir.path(), &rel, b"x");

        let files = scan_project(dir.path(), &rules()).unwrap();
        assert_eq!(relatives(&files), vec![rel.as_str()]);
    }

    #[test]
    fn test_wide_tree() {
        let dir = TempDir::new().unwrap();
        for i in 0..400 {
            write(dir.path(), &format!("ch{i}/part.tex"), b"x");
        }

        let files = scan_project(dir.path(), &rules()).unwrap();
        assert_eq!(files.len(), 400);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdir_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "main.tex", b"x");
        write(root, "open/a.tex", b"x");
        write(root, "locked/secret.tex", b"x");

        let locked = root.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // root can read anything, nothing to check
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = scan_project(root, &rules());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let files = result.unwrap();
        assert_eq!(relatives(&files), vec!["main.tex", "open/a.tex"]);
    }

    #[test]
    fn test_is_relevant() {
        let root = Path::new("/project");
        let rules = rules();

        assert!(rules.is_relevant(root, Path::new("/project/main.tex")));
        assert!(rules.is_relevant(root, Path::new("/project/img/a.PNG")));
        assert!(!rules.is_relevant(root, Path::new("/project/output.pdf")));
        assert!(!rules.is_relevant(root, Path::new("/project/main.aux")));
        assert!(!rules.is_relevant(root, Path::new("/project/.git/x.tex")));
        assert!(!rules.is_relevant(root, Path::new("/project/node_modules/a.sty")));
        assert!(!rules.is_relevant(root, Path::new("/elsewhere/main.tex")));
        assert!(!rules.is_relevant(root, root));
    }
}
