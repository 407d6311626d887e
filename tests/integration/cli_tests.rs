use clap::Parser;
use drivededup::cli::Cli;
use drivededup::error::ExitCode;
use drivededup::run_app_with_writer;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn run(args: &[&str], log: &Path) -> (ExitCode, String) {
    let mut argv = vec![
        "drivededup",
        "-q",
        "--hash-workers",
        "3",
        "--copy-workers",
        "2",
        "--log-file",
        log.to_str().unwrap(),
    ];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();

    let mut out = Vec::new();
    let code = run_app_with_writer(cli, &mut out).unwrap();
    (code, String::from_utf8(out).unwrap())
}

#[test]
fn test_scan_json_report() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(data.join("nested")).unwrap();
    fs::write(data.join("x.txt"), b"hello").unwrap();
    fs::write(data.join("nested").join("y.txt"), b"hello").unwrap();
    let log = dir.path().join("run.log");

    let (code, out) = run(
        &["scan", data.to_str().unwrap(), "--format", "json"],
        &log,
    );

    assert_eq!(code, ExitCode::Success);
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["summary"]["duplicate_groups"], 1);
    assert_eq!(value["summary"]["files"], 2);
    assert_eq!(value["duplicates"][0]["files"].as_array().unwrap().len(), 2);
    assert!(fs::read_to_string(&log).unwrap().contains("Received hash"));
}

#[test]
fn test_scan_without_duplicates_exits_two() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("a"), b"a").unwrap();
    fs::write(data.join("b"), b"b").unwrap();

    let (code, out) = run(&["scan", data.to_str().unwrap()], &dir.path().join("run.log"));

    assert_eq!(code, ExitCode::NoDuplicates);
    assert_eq!(out, "No duplicates found.\n");
}

#[test]
fn test_scan_with_compare_set() {
    let dir = tempdir().unwrap();
    let left = dir.path().join("left");
    let right = dir.path().join("right");
    fs::create_dir(&left).unwrap();
    fs::create_dir(&right).unwrap();
    fs::write(left.join("one.txt"), b"same").unwrap();
    fs::write(right.join("two.txt"), b"same").unwrap();

    let (code, out) = run(
        &[
            "scan",
            left.to_str().unwrap(),
            "--compare",
            right.to_str().unwrap(),
        ],
        &dir.path().join("run.log"),
    );

    assert_eq!(code, ExitCode::Success);
    assert!(out.contains("(2 files)"));
}

#[test]
fn test_diff_text_output() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old");
    let new = dir.path().join("new");
    fs::create_dir(&old).unwrap();
    fs::create_dir(&new).unwrap();
    fs::write(old.join("gone.txt"), b"gone").unwrap();
    fs::write(new.join("fresh.txt"), b"fresh").unwrap();

    let (code, out) = run(
        &[
            "diff",
            "--baseline",
            old.to_str().unwrap(),
            "--comparison",
            new.to_str().unwrap(),
        ],
        &dir.path().join("run.log"),
    );

    assert_eq!(code, ExitCode::Success);
    assert!(out.contains(&format!("Missing (1):\n  {}\n", old.join("gone.txt").display())));
    assert!(out.contains(&format!("New (1):\n  {}\n", new.join("fresh.txt").display())));
}

#[test]
fn test_copy_missing_command() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source");
    let destination = dir.path().join("destination");
    fs::create_dir_all(source.join("deep")).unwrap();
    fs::create_dir(&destination).unwrap();
    fs::write(source.join("deep").join("file.bin"), b"bytes").unwrap();

    let (code, out) = run(
        &[
            "copy-missing",
            source.to_str().unwrap(),
            destination.to_str().unwrap(),
        ],
        &dir.path().join("run.log"),
    );

    assert_eq!(code, ExitCode::Success);
    assert!(out.starts_with("1 file(s) queued for copy"));
    assert_eq!(
        fs::read(destination.join("deep").join("file.bin")).unwrap(),
        b"bytes"
    );
}

#[test]
fn test_invalid_worker_count_is_an_error() {
    let dir = tempdir().unwrap();
    let cli = Cli::try_parse_from([
        "drivededup",
        "-q",
        "--hash-workers",
        "0",
        "scan",
        dir.path().to_str().unwrap(),
    ])
    .unwrap();

    let mut out = Vec::new();
    let err = run_app_with_writer(cli, &mut out).unwrap_err();
    assert!(format!("{err:#}").contains("hash_workers must be at least 1"));
}
