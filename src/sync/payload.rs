//! Sync payload construction.
//!
//! Text sources are always inlined: they are small and the service needs
//! them for diagnostics anyway. Binary assets dominate payload size and
//! rarely change while editing, so an asset whose bytes match what the
//! service already confirmed travels as a hash reference instead.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use rustc_hash::FxHashSet;

use super::{ContentHash, HashCache, SyncError};
use crate::config::AgentConfig;
use crate::project::{FileKind, ProjectFile, ScanRules, scan_project};

/// One file in a sync payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEntry {
    /// Text source, sent verbatim.
    Inline(String),
    /// Binary asset whose bytes must be (re)sent.
    InlineBinary(Vec<u8>),
    /// Binary asset the service resolves from its own blob cache.
    Reference(String),
}

impl FileEntry {
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }
}

/// The per-attempt bundle of project files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPayload {
    /// Relative path of the document entry point.
    pub main: String,
    pub files: BTreeMap<String, FileEntry>,
}

impl SyncPayload {
    /// Number of binary entries sent as cache references.
    pub fn cached_count(&self) -> usize {
        self.files.values().filter(|e| e.is_reference()).count()
    }
}

/// Turns the current project tree into a [`SyncPayload`].
///
/// Owns the [`HashCache`]; the cache is only updated once a payload has
/// been built in full.
#[derive(Debug)]
pub struct PayloadBuilder {
    root: PathBuf,
    rules: ScanRules,
    /// Base name of the entry point (e.g. `main.tex`).
    main: String,
    cache: HashCache,
}

impl PayloadBuilder {
    pub fn new(root: impl Into<PathBuf>, rules: ScanRules, main: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            rules,
            main: main.into(),
            cache: HashCache::new(),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            config.get_root(),
            ScanRules::from_config(config),
            config.sync.main.clone(),
        )
    }

    pub fn cache(&self) -> &HashCache {
        &self.cache
    }

    /// Scan the project and build a payload.
    ///
    /// Any unreadable file aborts the whole attempt: a partial payload would
    /// make the service compile a project that does not exist on disk.
    pub fn build(&mut self) -> Result<SyncPayload, SyncError> {
        let scanned = scan_project(&self.root, &self.rules)?;

        let mut files = BTreeMap::new();
        let mut sent: Vec<(&str, ContentHash)> = Vec::new();

        for file in &scanned {
            let bytes = fs::read(&file.absolute).map_err(|e| SyncError::Read {
                path: file.absolute.clone(),
                source: e,
            })?;
            let hash = ContentHash::of(&bytes);

            let entry = match file.kind {
                FileKind::Text => FileEntry::Inline(String::from_utf8_lossy(&bytes).into_owned()),
                FileKind::Binary => match self.cache.cached_reference(&file.relative, hash) {
                    Some(server) => FileEntry::Reference(server.to_string()),
                    None => {
                        crate::debug!("sync"; "inlining {} ({})", file.relative, hash);
                        sent.push((&file.relative, hash));
                        FileEntry::InlineBinary(bytes)
                    }
                },
            };
            files.insert(file.relative.clone(), entry);
        }

        for (path, hash) in sent {
            self.cache.record_local(path, hash);
        }
        let live: FxHashSet<&str> = scanned.iter().map(|f| f.relative.as_str()).collect();
        self.cache.retain_paths(&live);

        Ok(SyncPayload {
            main: select_main(&scanned, &self.main),
            files,
        })
    }

    /// Absorb the blob ids the service confirmed after a successful compile.
    pub fn absorb_confirmations(&mut self, confirmed: &BTreeMap<String, String>) {
        for (path, server_hash) in confirmed {
            self.cache.record_server_confirmation(path, server_hash);
        }
    }
}

/// Pick the entry point: the shallowest text file named `main`
/// (ties broken by path order), or `main` itself when none exists.
fn select_main(files: &[ProjectFile], main: &str) -> String {
    files
        .iter()
        .filter(|f| f.kind == FileKind::Text)
        .filter(|f| f.relative.rsplit('/').next() == Some(main))
        .min_by(|a, b| {
            depth(&a.relative)
                .cmp(&depth(&b.relative))
                .then_with(|| a.relative.cmp(&b.relative))
        })
        .map(|f| f.relative.clone())
        .unwrap_or_else(|| main.to_string())
}

fn depth(relative: &str) -> usize {
    relative.matches('/').count()
}
