//! ZIP archive signature check and extraction.

use super::download::IngestError;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Local file header signature every ZIP archive starts with.
pub const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// True when `bytes` starts with the ZIP signature.
pub fn is_zip_prefix(bytes: &[u8]) -> bool {
    bytes.len() >= ZIP_MAGIC.len() && bytes[..ZIP_MAGIC.len()] == ZIP_MAGIC
}

/// Check the first four bytes of the file at `path`.
///
/// Unreadable or short files are reported as invalid rather than as errors.
pub fn has_zip_signature(path: &Path) -> bool {
    let mut prefix = [0u8; 4];
    let result = fs::File::open(path).and_then(|mut f| f.read_exact(&mut prefix));
    match result {
        Ok(()) if is_zip_prefix(&prefix) => true,
        Ok(()) => {
            error!(path = %path.display(), "file does not have a valid ZIP signature");
            false
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "error verifying ZIP file");
            false
        }
    }
}

/// Extract every entry of `archive` into `dest`, overwriting existing files.
///
/// Returns the paths written. Entries whose names would land outside `dest`
/// are rejected.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !has_zip_signature(archive) {
        return Err(IngestError::InvalidArchive(archive.to_path_buf()));
    }
    fs::create_dir_all(dest).map_err(|e| IngestError::io(dest, e))?;

    let file = fs::File::open(archive).map_err(|e| IngestError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| IngestError::Zip {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    })?;

    let names: Vec<&str> = zip.file_names().collect();
    info!(archive = %archive.display(), entries = ?names, "zip file contents");

    let mut written = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| IngestError::Zip {
            path: archive.to_path_buf(),
            reason: e.to_string(),
        })?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| IngestError::UnsafeEntry(entry.name().to_string()))?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| IngestError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| IngestError::io(parent, e))?;
        }
        let mut out = fs::File::create(&out_path).map_err(|e| IngestError::io(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| IngestError::io(&out_path, e))?;
        written.push(out_path);
    }

    info!(dest = %dest.display(), files = written.len(), "file extracted");
    Ok(written)
}
