use std::fs::{self, File};
use std::path::Path;

use tempfile::NamedTempFile;

use super::error::OutputError;

/// Write a file through a temporary sibling and rename it into place.
///
/// Creates the parent directory when needed. A failed write leaves any
/// existing file at `path` untouched. Returns the final file size.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<u64, OutputError>
where
    F: FnOnce(&mut File) -> Result<(), OutputError>,
{
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    write(temp.as_file_mut())?;
    temp.as_file().sync_all()?;

    let file = temp.persist(path).map_err(|e| OutputError::IoError(e.error))?;
    Ok(file.metadata()?.len())
}
