use drivededup::store::{ContentStore, StoreError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_association_of_same_new_hash() {
    let store = Arc::new(ContentStore::open_in_memory().unwrap());
    let threads: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..25 {
                    let path = PathBuf::from(format!("/drive/t{t}/f{i}.txt"));
                    // Every thread races on the same handful of new hashes.
                    store
                        .associate_file(&path, &format!("hash{}", i % 3), t % 2 == 0)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in threads {
        handle.join().unwrap();
    }

    let stats = store.stats().unwrap();
    assert_eq!(stats.files, 200);
    assert_eq!(stats.hashes, 3);
    assert_eq!(stats.associations, 200);
    assert_eq!(stats.paths, 8);

    let groups = store.duplicate_groups().unwrap();
    assert_eq!(groups.len(), 3);
    assert!(groups.iter().all(|g| g.len() >= 2));
}

#[test]
fn test_unverified_until_associated() {
    let store = ContentStore::open_in_memory().unwrap();
    let path = Path::new("/drive/pending.bin");

    store.add_file(path, true).unwrap();
    assert_eq!(store.unverified_files().unwrap(), vec![path.to_path_buf()]);
    assert!(store.verified_files().unwrap().is_empty());

    store.associate_file(path, "cafe", true).unwrap();
    assert!(store.unverified_files().unwrap().is_empty());
    assert_eq!(store.verified_files().unwrap(), vec![path.to_path_buf()]);
}

#[test]
fn test_directory_level_api() {
    let store = ContentStore::open_in_memory().unwrap();
    store.associate_path(Path::new("/drive/a"), "tree").unwrap();
    store.associate_path(Path::new("/drive/b"), "tree").unwrap();
    store.add_path(Path::new("/drive/c")).unwrap();

    assert!(store.has_path_hash("tree").unwrap());
    assert_eq!(
        store.paths_by_hash("tree").unwrap(),
        vec![PathBuf::from("/drive/a"), PathBuf::from("/drive/b")]
    );
    assert_eq!(store.duplicate_path_groups().unwrap().len(), 1);
    assert_eq!(
        store.unverified_paths().unwrap(),
        vec![PathBuf::from("/drive/c")]
    );
    assert_eq!(store.verified_paths().unwrap().len(), 2);
}

#[test]
fn test_closed_store_is_unavailable() {
    let store = ContentStore::open_in_memory().unwrap();
    store.close();

    assert!(!store.is_available());
    assert!(matches!(
        store.add_file_hash("x"),
        Err(StoreError::Unavailable)
    ));

    store.reset().unwrap();
    assert!(store.is_available());
    assert_eq!(store.add_file_hash("x").unwrap(), store.add_file_hash("x").unwrap());
}
