use drivededup::config::Config;
use drivededup::coordinator::{self, Event};
use drivededup::logging::{FileLog, NullSink};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::tempdir;

fn config(hash_workers: usize) -> Config {
    Config {
        hash_workers,
        copy_workers: 2,
        queue_capacity: 8,
        ..Config::default()
    }
}

#[test]
fn test_nested_duplicate_end_to_end() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("a");
    fs::create_dir_all(root.join("b")).unwrap();
    File::create(root.join("x.txt"))
        .unwrap()
        .write_all(b"hello")
        .unwrap();
    File::create(root.join("b").join("y.txt"))
        .unwrap()
        .write_all(b"hello")
        .unwrap();

    let (handle, _) = coordinator::spawn(&config(4), Arc::new(NullSink)).unwrap();
    handle.start([&root], true).unwrap();
    handle.wait_idle().unwrap();

    let stats = handle.stats().unwrap();
    assert_eq!(stats.files, 2);
    assert_eq!(stats.hashes, 1);

    let groups = handle.report().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].paths,
        vec![root.join("x.txt"), root.join("b").join("y.txt")]
    );
    assert_eq!(groups[0].hash, blake3::hash(b"hello").to_hex().to_string());
}

#[test]
fn test_unique_files_produce_no_groups() {
    let dir = tempdir().unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(dir.path().join(name), format!("content {name}")).unwrap();
    }

    let (handle, _) = coordinator::spawn(&config(2), Arc::new(NullSink)).unwrap();
    handle.start([dir.path()], true).unwrap();
    handle.wait_idle().unwrap();

    assert!(handle.report().unwrap().is_empty());
    assert_eq!(handle.stats().unwrap().associations, 3);
}

#[test]
fn test_every_group_has_at_least_two_members() {
    let dir = tempdir().unwrap();
    for i in 0..30 {
        let sub = dir.path().join(format!("d{}", i % 4));
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join(format!("f{i}.bin")), format!("{}", i % 7)).unwrap();
    }
    fs::write(dir.path().join("lonely.bin"), b"one of a kind").unwrap();

    let (handle, _) = coordinator::spawn(&config(3), Arc::new(NullSink)).unwrap();
    handle.start([dir.path()], true).unwrap();
    handle.wait_idle().unwrap();

    let groups = handle.report().unwrap();
    assert_eq!(groups.len(), 7);
    assert!(groups.iter().all(|g| g.len() >= 2));
    assert_eq!(groups.iter().map(|g| g.len()).sum::<usize>(), 30);
}

#[test]
fn test_duplicates_across_roots() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    fs::write(first.path().join("photo.jpg"), b"pixels").unwrap();
    fs::write(second.path().join("copy.jpg"), b"pixels").unwrap();

    let (handle, _) = coordinator::spawn(&config(2), Arc::new(NullSink)).unwrap();
    handle.start([first.path(), second.path()], true).unwrap();
    handle.wait_idle().unwrap();

    let groups = handle.report().unwrap();
    assert_eq!(groups.len(), 1);
    assert!(groups[0].paths.contains(&first.path().join("photo.jpg")));
    assert!(groups[0].paths.contains(&second.path().join("copy.jpg")));
}

#[test]
fn test_rescan_does_not_duplicate_associations() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"same").unwrap();
    fs::write(dir.path().join("b.txt"), b"same").unwrap();

    let (handle, _) = coordinator::spawn(&config(2), Arc::new(NullSink)).unwrap();
    for _ in 0..3 {
        handle.start([dir.path()], true).unwrap();
        handle.wait_idle().unwrap();
    }

    let stats = handle.stats().unwrap();
    assert_eq!(stats.files, 2);
    assert_eq!(stats.associations, 2);
    assert_eq!(handle.report().unwrap()[0].len(), 2);
}

#[test]
fn test_changed_file_is_reassociated() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.txt");
    fs::write(&path, b"draft").unwrap();

    let (handle, _) = coordinator::spawn(&config(1), Arc::new(NullSink)).unwrap();
    handle.start([dir.path()], true).unwrap();
    handle.wait_idle().unwrap();
    fs::write(&path, b"final").unwrap();
    handle.start([dir.path()], true).unwrap();
    handle.wait_idle().unwrap();

    assert_eq!(
        handle.store().hash_for_file(&path).unwrap(),
        Some(blake3::hash(b"final").to_hex().to_string())
    );
    assert_eq!(handle.stats().unwrap().associations, 1);
}

#[test]
fn test_messages_reach_file_log() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("x.txt"), b"x").unwrap();
    let log_path = dir.path().join("messages.log");

    let (handle, events) =
        coordinator::spawn(&config(2), Arc::new(FileLog::open(&log_path))).unwrap();
    handle.start([&data], false).unwrap();
    handle.wait_idle().unwrap();
    handle.shutdown();

    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.contains(&format!(
        "on file {} - generate: false",
        data.join("x.txt").display()
    )));
    assert!(log.ends_with("All tasks stopped\n"));

    let received: Vec<Event> = events.try_iter().collect();
    assert!(received.contains(&Event::Finished));
}

#[test]
fn test_files_by_hash_after_scan() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("one"), b"payload").unwrap();
    fs::write(dir.path().join("two"), b"payload").unwrap();

    let (handle, _) = coordinator::spawn(&config(2), Arc::new(NullSink)).unwrap();
    handle.start([dir.path()], true).unwrap();
    handle.wait_idle().unwrap();

    let hash = blake3::hash(b"payload").to_hex().to_string();
    let files: Vec<PathBuf> = handle.store().files_by_hash(&hash).unwrap();
    assert_eq!(files, vec![dir.path().join("one"), dir.path().join("two")]);
}

#[cfg(unix)]
#[test]
fn test_non_utf8_file_names_scan_separately() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let first = dir.path().join(OsStr::from_bytes(b"f\xff"));
    let second = dir.path().join(OsStr::from_bytes(b"f\xfe"));
    fs::write(&first, b"twin").unwrap();
    fs::write(&second, b"twin").unwrap();

    let (handle, _) = coordinator::spawn(&config(2), Arc::new(NullSink)).unwrap();
    handle.start([dir.path()], true).unwrap();
    handle.wait_idle().unwrap();

    assert_eq!(handle.stats().unwrap().files, 2);
    let groups = handle.report().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].paths, vec![second, first]);
}
