//! Filesystem helpers shared by the phases.
//!

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use uuid::Uuid;

use crate::{PipelineError, Result};

/// Create `dir` and its parents. Succeeds if it already exists, including
/// when another task created it concurrently.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))
}

/// Replace the contents of `path` with `contents`.
///
/// The data goes to a uniquely named temporary file next to `path` first and
/// is renamed into place, so a concurrent reader sees either the old file or
/// the complete new one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4()));

    let written = File::create(&temp_path).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(PipelineError::io(&temp_path, e));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        PipelineError::io(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn overwrites_wholesale() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");

        write_atomic(&path, b"first version").unwrap();
        write_atomic(&path, b"v2").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"v2");
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
