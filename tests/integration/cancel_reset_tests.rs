use drivededup::config::Config;
use drivededup::coordinator::{self, Event};
use crossbeam_channel::{unbounded, Receiver, Sender};
use drivededup::logging::{MessageSink, NullSink};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn config() -> Config {
    Config {
        hash_workers: 2,
        copy_workers: 1,
        queue_capacity: 256,
        ..Config::default()
    }
}

fn populate(root: &Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let sub = root.join(format!("dir{}", i % 5));
            fs::create_dir_all(&sub).unwrap();
            let path = sub.join(format!("file{i:04}.dat"));
            fs::write(&path, vec![(i % 251) as u8; 2048]).unwrap();
            path
        })
        .collect()
}

/// Holds the coordinator on one exact message until released.
struct Gate {
    at: String,
    entered: Sender<()>,
    release: Receiver<()>,
}

impl MessageSink for Gate {
    fn message(&self, text: &str) {
        if text == self.at {
            let _ = self.entered.send(());
            let _ = self.release.recv();
        }
    }
}

#[test]
fn test_cancel_mid_walk_leaves_dispatched_files_unverified() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    let files: Vec<PathBuf> = (0..40)
        .map(|i| {
            let path = sub.join(format!("file{i:02}.dat"));
            fs::write(&path, vec![i as u8; 1024]).unwrap();
            path
        })
        .collect();

    let (entered_tx, entered_rx) = unbounded();
    let (release_tx, release_rx) = unbounded();
    let gate = Gate {
        at: format!("Processing path {}", sub.display()),
        entered: entered_tx,
        release: release_rx,
    };
    let (handle, events) = coordinator::spawn(&config(), Arc::new(gate)).unwrap();
    handle.start([dir.path()], true).unwrap();

    // The walk has passed its cancel check for `sub` and will queue every
    // file in it; the workers see the flag before starting any of them.
    entered_rx.recv().unwrap();
    handle.cancel();
    release_tx.send(()).unwrap();
    drop(release_tx);

    handle
        .wait_idle_timeout(Duration::from_secs(30))
        .expect("cancelled scan must drain");

    let store = handle.store();
    assert_eq!(store.unverified_files().unwrap(), files);
    assert_eq!(store.stats().unwrap().associations, 0);
    assert!(handle.canceller().is_cancelled());
    handle.shutdown();

    let received: Vec<Event> = events.try_iter().collect();
    assert!(received.contains(&Event::Finished));
    assert!(received.contains(&Event::Progress {
        completed: files.len() as u64,
        dispatched: files.len() as u64,
    }));
}

#[test]
fn test_reset_after_cancel_forgets_everything() {
    let dir = tempdir().unwrap();
    let files = populate(dir.path(), 50);

    let (handle, _) = coordinator::spawn(&config(), Arc::new(NullSink)).unwrap();
    handle.start([dir.path()], true).unwrap();
    handle.wait_idle().unwrap();
    assert!(handle.store().has_file(&files[0]).unwrap());

    handle.cancel();
    handle.reset().unwrap();

    let store = handle.store();
    for path in &files {
        assert!(!store.has_file(path).unwrap());
    }
    assert!(!store.has_path(files[0].parent().unwrap()).unwrap());
    assert!(!store
        .has_file_hash(&blake3::hash(&[0u8; 2048]).to_hex().to_string())
        .unwrap());
    assert!(handle.report().unwrap().is_empty());
}

#[test]
fn test_scan_after_reset_runs_to_completion() {
    let dir = tempdir().unwrap();
    let files = populate(dir.path(), 60);

    let (handle, _) = coordinator::spawn(&config(), Arc::new(NullSink)).unwrap();
    handle.start([dir.path()], true).unwrap();
    handle.cancel();
    handle.reset().unwrap();
    assert!(!handle.canceller().is_cancelled());

    handle.start([dir.path()], true).unwrap();
    handle.wait_idle().unwrap();

    let stats = handle.stats().unwrap();
    assert_eq!(stats.files, files.len() as u64);
    assert_eq!(stats.associations, files.len() as u64);
    assert!(handle.store().unverified_files().unwrap().is_empty());
}

#[test]
fn test_reset_while_jobs_outstanding() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 200);

    let (handle, _) = coordinator::spawn(&config(), Arc::new(NullSink)).unwrap();
    handle.start([dir.path()], true).unwrap();
    // No explicit cancel: reset cancels and drains on its own.
    handle.reset().unwrap();

    assert_eq!(handle.stats().unwrap(), Default::default());
    handle.wait_idle_timeout(Duration::from_secs(5)).unwrap();
}

#[test]
fn test_closed_store_reports_unavailable_then_reset_recovers() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"a").unwrap();

    let (handle, _) = coordinator::spawn(&config(), Arc::new(NullSink)).unwrap();
    handle.store().close();

    // Results are dropped with a message; the run still finishes.
    handle.start([dir.path()], true).unwrap();
    handle.wait_idle().unwrap();
    assert!(handle.report().is_err());

    handle.reset().unwrap();
    handle.start([dir.path()], true).unwrap();
    handle.wait_idle().unwrap();
    assert_eq!(handle.stats().unwrap().associations, 1);
}
