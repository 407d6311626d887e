use drivededup::config::Config;
use drivededup::coordinator::{self, Event};
use drivededup::logging::NullSink;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_missing_and_new_between_sets() {
    let baseline = tempdir().unwrap();
    let comparison = tempdir().unwrap();
    fs::write(baseline.path().join("shared.txt"), b"shared").unwrap();
    fs::write(baseline.path().join("only_old.txt"), b"old").unwrap();
    fs::write(comparison.path().join("shared_renamed.txt"), b"shared").unwrap();
    fs::write(comparison.path().join("only_new.txt"), b"new").unwrap();

    let config = Config {
        hash_workers: 2,
        copy_workers: 1,
        ..Config::default()
    };
    let (handle, events) = coordinator::spawn(&config, Arc::new(NullSink)).unwrap();
    handle.start([baseline.path()], true).unwrap();
    handle.start([comparison.path()], false).unwrap();
    handle.wait_idle().unwrap();

    let missing = handle.missing().unwrap();
    let new = handle.new_files().unwrap();
    handle.shutdown();

    assert_eq!(missing, vec![baseline.path().join("only_old.txt")]);
    assert_eq!(new, vec![comparison.path().join("only_new.txt")]);

    let received: Vec<Event> = events.try_iter().collect();
    assert!(received.contains(&Event::Missing(missing)));
    assert!(received.contains(&Event::New(new)));
}

#[test]
fn test_identical_sets_have_no_differences() {
    let baseline = tempdir().unwrap();
    let comparison = tempdir().unwrap();
    for name in ["a", "b", "c"] {
        fs::write(baseline.path().join(name), name).unwrap();
        fs::write(comparison.path().join(name), name).unwrap();
    }

    let (handle, _) = coordinator::spawn(&Config::default(), Arc::new(NullSink)).unwrap();
    handle.start([baseline.path()], true).unwrap();
    handle.start([comparison.path()], false).unwrap();
    handle.wait_idle().unwrap();

    assert!(handle.missing().unwrap().is_empty());
    assert!(handle.new_files().unwrap().is_empty());
    assert_eq!(handle.report().unwrap().len(), 3);
}
