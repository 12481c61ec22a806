//! Project discovery.
//!
//! - `kind` - recognized file types (text sources vs binary assets)
//! - `scan` - directory walk producing the ordered project file list

mod kind;
mod scan;

pub use kind::FileKind;
pub use scan::{ProjectFile, ScanError, ScanRules, scan_project};
