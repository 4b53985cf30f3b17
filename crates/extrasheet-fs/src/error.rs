use std::io;
use std::path::PathBuf;

/// Errors from folder IO and the snapshot store.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("walking {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{}: path is not valid UTF-8", path.display())]
    NonUtf8Path { path: PathBuf },

    #[error("snapshot archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("snapshot {digest} not found under {}", dir.display())]
    MissingSnapshot { digest: String, dir: PathBuf },

    #[error("snapshot {expected} is corrupt (content hashes to {actual})")]
    DigestMismatch { expected: String, actual: String },

    #[error("{}: malformed snapshot pointer {content:?}", path.display())]
    BadPointer { path: PathBuf, content: String },

    #[error("folder is locked by another extrasheet process (pid {holder}); run `extrasheet unlock` if it is gone ({})", path.display())]
    Locked { path: PathBuf, holder: String },
}

impl FsError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> FsError {
        let path = path.into();
        move |source| FsError::Io { path, source }
    }
}
