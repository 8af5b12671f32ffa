/// End-to-end tests for the `git-ai-segments replay` binary.
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn record(ts: u64, uri: &str, line: u32, text: &str) -> String {
    serde_json::json!({
        "timestamp": ts,
        "document": { "uri": uri },
        "contentChanges": [{
            "range": {
                "start": { "line": line, "character": 0 },
                "end": { "line": line, "character": 0 }
            },
            "text": text
        }]
    })
    .to_string()
}

fn write_log(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

fn segments_from(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8(stdout.to_vec())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn test_replay_prints_closed_segments() {
    let log = write_log(&[
        record(100, "file:///repo/a.rs", 0, "a"),
        record(200, "file:///repo/a.rs", 1, "b"),
        record(300, "file:///repo/a.rs", 30, "c"),
    ]);

    let output = Command::cargo_bin("git-ai-segments")
        .unwrap()
        .env("HOME", log.path().parent().unwrap())
        .arg("replay")
        .arg(log.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Replayed 3 events, 2 segments closed"))
        .get_output()
        .stdout
        .clone();

    let segments = segments_from(&output);
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0]["rangeStartLine"], 0);
    assert_eq!(segments[0]["rangeEndLineExclusive"], 2);
    assert_eq!(segments[0]["startedAt"], 100);
    assert_eq!(segments[0]["endedAt"], 300);
    assert_eq!(segments[0]["closeReason"], "adjacency_gap");
    assert_eq!(segments[1]["rangeStartLine"], 30);
    assert_eq!(segments[1]["closeReason"], "force_closed");
}

#[test]
fn test_replay_gap_override() {
    let log = write_log(&[
        record(1, "file:///repo/a.rs", 0, "a"),
        record(2, "file:///repo/a.rs", 4, "b"),
    ]);

    let output = Command::cargo_bin("git-ai-segments")
        .unwrap()
        .env("HOME", log.path().parent().unwrap())
        .args(["replay", "--adjacency-gap-lines", "5"])
        .arg(log.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let segments = segments_from(&output);
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0]["rangeStartLine"], 0);
    assert_eq!(segments[0]["rangeEndLineExclusive"], 5);
}

#[test]
fn test_replay_from_stdin_writes_log_dir() {
    let log_dir = tempfile::tempdir().unwrap();
    let input = format!("{}\n", record(1, "file:///repo/a.rs", 0, "a"));

    Command::cargo_bin("git-ai-segments")
        .unwrap()
        .env("HOME", log_dir.path())
        .args(["replay", "-", "--log-dir"])
        .arg(log_dir.path())
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"documentUri\":\"file:///repo/a.rs\""));

    let logs: Vec<_> = std::fs::read_dir(log_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "log"))
        .collect();
    assert_eq!(logs.len(), 1);
    let contents = std::fs::read_to_string(logs[0].path()).unwrap();
    assert!(contents.contains("segment closed"));
    assert!(contents.contains("replay finished"));
}

#[test]
fn test_replay_invalid_record_fails() {
    let log = write_log(&["{ not json".to_string()]);

    Command::cargo_bin("git-ai-segments")
        .unwrap()
        .env("HOME", log.path().parent().unwrap())
        .arg("replay")
        .arg(log.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 1"));
}

#[test]
fn test_replay_missing_file_fails() {
    Command::cargo_bin("git-ai-segments")
        .unwrap()
        .args(["replay", "/nonexistent/changes.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("IO error"));
}
