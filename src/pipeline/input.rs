//! Input resolution: turn a user-supplied folder into the stable PDF list.
//!
//! Only the folder's own entries are considered; sub-folders are not walked.
//! A file qualifies when its extension is `pdf` in any ASCII case. The list
//! is sorted by file name so that the document index, and with it the pair
//! order of every report, is the same from run to run.

use crate::error::SimilarityError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// List the PDF files directly inside `folder`, sorted by file name.
pub fn discover_pdfs(folder: &Path) -> Result<Vec<PathBuf>, SimilarityError> {
    if !folder.exists() {
        return Err(SimilarityError::InputNotFound {
            path: folder.to_path_buf(),
        });
    }
    if !folder.is_dir() {
        return Err(SimilarityError::NotADirectory {
            path: folder.to_path_buf(),
        });
    }

    let read_err = |source| SimilarityError::ReadDirFailed {
        path: folder.to_path_buf(),
        source,
    };

    let mut pdfs = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_file() && is_pdf_name(&path) {
            pdfs.push(path);
        }
    }
    pdfs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    debug!("Discovered {} PDF(s) in {}", pdfs.len(), folder.display());
    Ok(pdfs)
}

/// Check if the path carries a `.pdf` extension (ASCII case-insensitive).
pub fn is_pdf_name(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// File name as displayed in reports (lossy for non-UTF-8 names).
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
