//! Filesystem side of an extrasheet folder: reading and writing the live
//! tree, the pristine snapshot store, and the per-folder lock.

mod atomic;
mod error;
mod lock;
pub mod pristine;
mod tree;

pub use atomic::write_atomic;
pub use error::FsError;
pub use lock::FolderLock;
pub use pristine::{SnapshotHandle, SnapshotStore, StaleMarker};
pub use tree::{read_tree, write_tree};
