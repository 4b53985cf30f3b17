//! Content-addressed pristine snapshots.
//!
//! Layout under the folder:
//!
//! ```text
//! .pristine/
//!   snapshots/<sha256>.zip   one archive per capture, never modified
//!   CURRENT                  hex digest of the active snapshot
//!   STALE                    present after a push until the next capture
//!   lock                     see [`crate::FolderLock`]
//! ```
//!
//! The archive is written before `CURRENT` is flipped, so an interrupted
//! capture leaves the previous snapshot active.

use std::fmt;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use extrasheet_model::FileTree;
use sha2::{Digest, Sha256};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::atomic::write_atomic;
use crate::FsError;

pub const PRISTINE_DIR: &str = ".pristine";
const SNAPSHOTS_DIR: &str = "snapshots";
const CURRENT_FILE: &str = "CURRENT";
const STALE_FILE: &str = "STALE";

/// Identifies one captured snapshot by the SHA-256 of its archive bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SnapshotHandle {
    digest: String,
}

impl SnapshotHandle {
    pub fn digest(&self) -> &str {
        &self.digest
    }

    fn parse(raw: &str) -> Option<Self> {
        let digest = raw.trim();
        let valid = digest.len() == 64
            && digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self {
            digest: digest.to_string(),
        })
    }
}

impl fmt::Display for SnapshotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest)
    }
}

/// Contents of `.pristine/STALE`: the snapshot a push was based on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaleMarker {
    pub pushed_from: String,
}

#[derive(Debug)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Open the store for `folder`. Nothing is created until the first capture.
    pub fn open(folder: impl AsRef<Path>) -> Self {
        Self {
            root: folder.as_ref().join(PRISTINE_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.root
    }

    fn snapshot_path(&self, digest: &str) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR).join(format!("{digest}.zip"))
    }

    /// Archive `tree`, store it under its digest and make it current.
    pub fn capture(&self, tree: &FileTree) -> Result<SnapshotHandle, FsError> {
        let bytes = archive(tree)?;
        let digest = hex_digest(&bytes);
        let path = self.snapshot_path(&digest);

        if path.exists() {
            log::debug!("snapshot {digest} already stored");
        } else {
            write_atomic(&path, &bytes).map_err(FsError::io(&path))?;
        }

        let current = self.root.join(CURRENT_FILE);
        write_atomic(&current, format!("{digest}\n").as_bytes())
            .map_err(FsError::io(&current))?;
        self.clear_stale()?;

        log::info!("captured snapshot {digest} ({} files)", tree.len());
        Ok(SnapshotHandle { digest })
    }

    /// The active snapshot, or `None` if nothing was ever captured.
    pub fn current(&self) -> Result<Option<SnapshotHandle>, FsError> {
        let path = self.root.join(CURRENT_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(FsError::io(&path)(err)),
        };
        SnapshotHandle::parse(&content)
            .map(Some)
            .ok_or(FsError::BadPointer { path, content })
    }

    /// Load a snapshot. The archive digest is verified before any entry is read.
    pub fn restore(&self, handle: &SnapshotHandle) -> Result<FileTree, FsError> {
        let path = self.snapshot_path(&handle.digest);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(FsError::MissingSnapshot {
                    digest: handle.digest.clone(),
                    dir: self.root.join(SNAPSHOTS_DIR),
                })
            }
            Err(err) => return Err(FsError::io(&path)(err)),
        };

        let actual = hex_digest(&bytes);
        if actual != handle.digest {
            return Err(FsError::DigestMismatch {
                expected: handle.digest.clone(),
                actual,
            });
        }
        unarchive(&bytes, &path)
    }

    /// Record that a push was applied on top of `handle`.
    pub fn mark_pushed(&self, handle: &SnapshotHandle) -> Result<(), FsError> {
        let path = self.root.join(STALE_FILE);
        write_atomic(&path, format!("{}\n", handle.digest).as_bytes())
            .map_err(FsError::io(&path))
    }

    pub fn stale_marker(&self) -> Result<Option<StaleMarker>, FsError> {
        let path = self.root.join(STALE_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(StaleMarker {
                pushed_from: content.trim().to_string(),
            })),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(FsError::io(&path)(err)),
        }
    }

    pub fn is_stale(&self) -> Result<bool, FsError> {
        Ok(self.stale_marker()?.is_some())
    }

    fn clear_stale(&self) -> Result<(), FsError> {
        let path = self.root.join(STALE_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(FsError::io(&path)(err)),
        }
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Entries go in path order with fixed timestamps and permissions, so equal
/// trees always produce identical bytes.
fn archive(tree: &FileTree) -> Result<Vec<u8>, FsError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::<()>::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    for (path, bytes) in tree.iter() {
        writer.start_file(path, options)?;
        writer
            .write_all(bytes)
            .map_err(|source| FsError::Io {
                path: PathBuf::from(path),
                source,
            })?;
    }
    Ok(writer.finish()?.into_inner())
}

fn unarchive(bytes: &[u8], origin: &Path) -> Result<FileTree, FsError> {
    let mut zip = ZipArchive::new(Cursor::new(bytes))?;
    let mut tree = FileTree::new();
    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(FsError::io(origin))?;
        tree.insert(name, buf);
    }
    Ok(tree)
}
