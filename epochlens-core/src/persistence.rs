//! JSON artifact helpers.
//!
//! Run exports are written to a `<name>.tmp` sibling and renamed into place, so a
//! reader never observes a half-written run.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::LensError;

/// Serialize `data` as pretty JSON and atomically replace `path`.
/// Parent directories are created as needed.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<(), LensError> {
    let json = serde_json::to_vec_pretty(data)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    tracing::debug!(path = %path.display(), "Wrote JSON artifact");
    Ok(())
}

/// Sibling that keeps the full file name, so `run.json` and `run.csv`
/// never share a temporary file.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read JSON from `path`, or `None` when the file does not exist.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, LensError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}
