//! Recognized project file types.

use std::path::Path;

/// Source files sent in full on every sync.
const TEXT_EXTENSIONS: &[&str] = &[
    "tex", "bib", "sty", "cls", "bst", "txt", "csv", "dat", "tsv", "tikz",
];

/// Assets eligible for the server-side blob cache.
const BINARY_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "eps", "otf", "ttf"];

/// How a project file travels over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileKind {
    /// Text source, always inlined.
    Text,
    /// Binary asset, inlined as base64 or referenced by hash.
    Binary,
}

impl FileKind {
    /// Classify a path by extension (case-insensitive).
    ///
    /// Returns `None` for files the compile service has no use for.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::from_extension(&ext)
    }

    fn from_extension(ext: &str) -> Option<Self> {
        if TEXT_EXTENSIONS.contains(&ext) {
            Some(Self::Text)
        } else if BINARY_EXTENSIONS.contains(&ext) {
            Some(Self::Binary)
        } else {
            None
        }
    }
}
