use std::fs;
use std::path::Path;

use extrasheet_model::FileTree;
use walkdir::WalkDir;

use crate::atomic::write_atomic;
use crate::FsError;

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

/// Read every live file under `folder` into a [`FileTree`].
///
/// Dot entries are skipped at every level, which excludes `.pristine/`,
/// `.raw/` and editor droppings.
pub fn read_tree(folder: &Path) -> Result<FileTree, FsError> {
    let mut tree = FileTree::new();
    let walker = WalkDir::new(folder)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry.file_name()));

    for entry in walker {
        let entry = entry.map_err(|source| FsError::Walk {
            root: folder.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(folder)
            .unwrap_or_else(|_| entry.path());
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| FsError::NonUtf8Path {
                path: entry.path().to_path_buf(),
            })?
            .join("/");
        let bytes = fs::read(entry.path()).map_err(FsError::io(entry.path()))?;
        tree.insert(key, bytes);
    }

    log::debug!("read {} file(s) from {}", tree.len(), folder.display());
    Ok(tree)
}

/// Write `tree` into `folder`, replacing each file atomically, and delete
/// live files the tree no longer contains. Dot entries are left alone.
pub fn write_tree(folder: &Path, tree: &FileTree) -> Result<(), FsError> {
    for (path, bytes) in tree.iter() {
        let dest = folder.join(path);
        write_atomic(&dest, bytes).map_err(FsError::io(&dest))?;
    }

    if folder.exists() {
        let existing = read_tree(folder)?;
        for stale in existing.paths().filter(|p| !tree.contains(p)) {
            let path = folder.join(stale);
            log::debug!("removing {}", path.display());
            fs::remove_file(&path).map_err(FsError::io(&path))?;
        }
    }
    Ok(())
}
