use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// Replace `path` with `contents` in one rename.
///
/// The data goes to a hidden temp file in the same directory first, so readers
/// see either the old file or the complete new one. Existing permissions are
/// carried over.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".paperwatch-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions())?;
    }

    tmp.persist(path)?;
    Ok(())
}
