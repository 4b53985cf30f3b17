use std::fs;

use extrasheet_fs::{read_tree, write_tree, FsError, SnapshotStore};
use extrasheet_model::FileTree;
use pretty_assertions::assert_eq;

fn tree(data: &str) -> FileTree {
    let mut tree = FileTree::new();
    tree.insert(
        "spreadsheet.json",
        br#"{"spreadsheetId": "x", "sheets": []}"#.to_vec(),
    );
    tree.insert("Sheet1/data.tsv", data.as_bytes().to_vec());
    tree
}

#[test]
fn capture_then_restore_returns_the_same_tree() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::open(dir.path());
    assert_eq!(store.current().unwrap(), None);

    let handle = store.capture(&tree("a\tb\n")).unwrap();
    assert_eq!(handle.digest().len(), 64);
    assert_eq!(store.current().unwrap(), Some(handle.clone()));
    assert_eq!(store.restore(&handle).unwrap(), tree("a\tb\n"));
}

#[test]
fn identical_trees_share_a_digest() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::open(dir.path());
    let first = store.capture(&tree("1\n")).unwrap();
    let second = store.capture(&tree("1\n")).unwrap();
    assert_eq!(first, second);

    let third = store.capture(&tree("2\n")).unwrap();
    assert_ne!(first, third);
    assert_eq!(store.current().unwrap(), Some(third));
    // Older snapshots stay restorable.
    assert_eq!(store.restore(&first).unwrap(), tree("1\n"));
}

#[test]
fn corrupted_archive_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::open(dir.path());
    let handle = store.capture(&tree("x\n")).unwrap();

    let path = store
        .dir()
        .join("snapshots")
        .join(format!("{}.zip", handle.digest()));
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&path, bytes).unwrap();

    match store.restore(&handle) {
        Err(FsError::DigestMismatch { expected, .. }) => assert_eq!(expected, handle.digest()),
        other => panic!("expected digest mismatch, got {other:?}"),
    }
}

#[test]
fn missing_archive_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::open(dir.path());
    let handle = store.capture(&tree("x\n")).unwrap();
    fs::remove_dir_all(store.dir().join("snapshots")).unwrap();
    assert!(matches!(
        store.restore(&handle),
        Err(FsError::MissingSnapshot { .. })
    ));
}

#[test]
fn malformed_current_pointer_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::open(dir.path());
    fs::create_dir_all(store.dir()).unwrap();
    fs::write(store.dir().join("CURRENT"), "garbage").unwrap();
    assert!(matches!(store.current(), Err(FsError::BadPointer { .. })));
}

#[test]
fn push_marks_stale_until_next_capture() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::open(dir.path());
    let handle = store.capture(&tree("x\n")).unwrap();
    assert!(!store.is_stale().unwrap());

    store.mark_pushed(&handle).unwrap();
    let marker = store.stale_marker().unwrap().expect("marker written");
    assert_eq!(marker.pushed_from, handle.digest());

    store.capture(&tree("y\n")).unwrap();
    assert!(!store.is_stale().unwrap());
}

#[test]
fn snapshot_files_never_leak_into_the_live_tree() {
    let dir = tempfile::tempdir().unwrap();
    let live = tree("a\n");
    write_tree(dir.path(), &live).unwrap();

    let store = SnapshotStore::open(dir.path());
    let handle = store.capture(&read_tree(dir.path()).unwrap()).unwrap();
    store.mark_pushed(&handle).unwrap();

    assert_eq!(read_tree(dir.path()).unwrap(), live);
}
