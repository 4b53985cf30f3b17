//! Atomic file replacement.
//!
//! Bytes go to a temp file in the destination directory (so the final rename
//! never crosses devices), are flushed and synced, then renamed over the
//! destination. Readers see either the old file or the new one.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` is `Some("")` for bare relative names like `CURRENT`.
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Replace `dest` with `bytes`, creating parent directories as needed.
pub fn write_atomic(dest: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    let dest = dest.as_ref();
    let dir = parent_dir_or_dot(dest);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;

    // Directory sync is best-effort: the file is already in place.
    if let Err(err) = File::open(dir).and_then(|d| d.sync_all()) {
        log::trace!("could not sync directory {}: {err}", dir.display());
    }
    Ok(())
}
