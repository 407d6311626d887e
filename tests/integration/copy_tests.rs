use drivededup::config::Config;
use drivededup::coordinator;
use drivededup::logging::NullSink;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn config() -> Config {
    Config {
        hash_workers: 3,
        copy_workers: 2,
        queue_capacity: 16,
        ..Config::default()
    }
}

#[test]
fn test_copy_missing_mirrors_layout() {
    let source = tempdir().unwrap();
    let destination = tempdir().unwrap();
    fs::create_dir_all(source.path().join("albums").join("2019")).unwrap();
    fs::write(source.path().join("top.txt"), b"top").unwrap();
    fs::write(
        source.path().join("albums").join("2019").join("beach.jpg"),
        b"sand",
    )
    .unwrap();
    // Same content under another name: nothing to copy for it.
    fs::write(source.path().join("kept.txt"), b"already there").unwrap();
    fs::write(destination.path().join("renamed.txt"), b"already there").unwrap();

    let (handle, _) = coordinator::spawn(&config(), Arc::new(NullSink)).unwrap();
    handle.start([source.path()], true).unwrap();
    handle.start([destination.path()], false).unwrap();
    handle.wait_idle().unwrap();

    let queued = handle
        .copy_missing(source.path(), destination.path())
        .unwrap();
    handle.wait_idle().unwrap();

    assert_eq!(queued, 2);
    assert_eq!(
        fs::read(destination.path().join("top.txt")).unwrap(),
        b"top"
    );
    assert_eq!(
        fs::read(
            destination
                .path()
                .join("albums")
                .join("2019")
                .join("beach.jpg")
        )
        .unwrap(),
        b"sand"
    );
    assert!(!destination.path().join("kept.txt").exists());
}

#[test]
fn test_copy_missing_is_idempotent() {
    let source = tempdir().unwrap();
    let destination = tempdir().unwrap();
    fs::write(source.path().join("a.bin"), b"alpha").unwrap();
    fs::write(source.path().join("b.bin"), b"beta").unwrap();

    let (handle, _) = coordinator::spawn(&config(), Arc::new(NullSink)).unwrap();
    handle.start([source.path()], true).unwrap();
    handle.wait_idle().unwrap();

    assert_eq!(
        handle
            .copy_missing(source.path(), destination.path())
            .unwrap(),
        2
    );
    handle.wait_idle().unwrap();

    // Copied destinations were recorded, so the second pass finds nothing.
    assert_eq!(
        handle
            .copy_missing(source.path(), destination.path())
            .unwrap(),
        0
    );
    assert_eq!(
        handle
            .store()
            .hash_for_file(&destination.path().join("a.bin"))
            .unwrap(),
        Some(blake3::hash(b"alpha").to_hex().to_string())
    );
}

#[test]
fn test_copy_missing_with_nothing_hashed() {
    let source = tempdir().unwrap();
    let destination = tempdir().unwrap();
    fs::write(source.path().join("unscanned.txt"), b"x").unwrap();

    let (handle, _) = coordinator::spawn(&config(), Arc::new(NullSink)).unwrap();
    let queued = handle
        .copy_missing(source.path(), destination.path())
        .unwrap();
    handle.wait_idle().unwrap();

    assert_eq!(queued, 0);
    assert!(!destination.path().join("unscanned.txt").exists());
}

#[test]
fn test_copy_missing_never_overwrites_destination() {
    let source = tempdir().unwrap();
    let destination = tempdir().unwrap();
    fs::write(source.path().join("notes.txt"), b"source version").unwrap();
    fs::write(
        destination.path().join("notes.txt"),
        b"irreplaceable destination edit",
    )
    .unwrap();

    let (handle, _) = coordinator::spawn(&config(), Arc::new(NullSink)).unwrap();
    handle.start([source.path()], true).unwrap();
    handle.start([destination.path()], false).unwrap();
    handle.wait_idle().unwrap();

    let queued = handle
        .copy_missing(source.path(), destination.path())
        .unwrap();
    handle.wait_idle().unwrap();

    assert_eq!(queued, 1);
    assert_eq!(
        fs::read(destination.path().join("notes.txt")).unwrap(),
        b"irreplaceable destination edit"
    );
    // The failed copy is not recorded as present.
    assert_eq!(
        handle
            .store()
            .hash_for_file(&destination.path().join("notes.txt"))
            .unwrap(),
        Some(
            blake3::hash(b"irreplaceable destination edit")
                .to_hex()
                .to_string()
        )
    );
}
