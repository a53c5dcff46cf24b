//! File-backed tests for appending, rewriting and resilient loading.

use ripple_jsonl::{Warning, append_jsonl, read_jsonl_resilient, write_jsonl_atomic};
use rstest::rstest;
use serde::{Deserialize, Serialize};
use tempfile::tempdir;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Snapshot {
    kind: String,
    nodes: usize,
}

fn snapshot(kind: &str, nodes: usize) -> Snapshot {
    Snapshot {
        kind: kind.to_string(),
        nodes,
    }
}

#[tokio::test]
async fn append_creates_file_and_parent_directories() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("history.jsonl");

    append_jsonl(&path, &snapshot("graph", 3)).await.unwrap();
    append_jsonl(&path, &snapshot("impact", 2)).await.unwrap();

    let (records, warnings): (Vec<Snapshot>, _) = read_jsonl_resilient(&path).await.unwrap();
    assert!(warnings.is_empty());
    assert_eq!(records, vec![snapshot("graph", 3), snapshot("impact", 2)]);
}

#[tokio::test]
async fn atomic_write_replaces_previous_contents() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.jsonl");

    write_jsonl_atomic(&path, &[snapshot("graph", 1), snapshot("graph", 2)])
        .await
        .unwrap();
    write_jsonl_atomic(&path, &[snapshot("execution", 9)])
        .await
        .unwrap();

    let (records, _): (Vec<Snapshot>, _) = read_jsonl_resilient(&path).await.unwrap();
    assert_eq!(records, vec![snapshot("execution", 9)]);
    assert!(!dir.path().join("history.jsonl.tmp").exists());
}

#[rstest]
#[case::truncated("{\"kind\":\"graph\",", 2)]
#[case::wrong_shape("{\"unexpected\":true}", 2)]
#[case::plain_text("not json at all", 2)]
#[tokio::test]
async fn resilient_read_skips_bad_line(#[case] bad_line: &str, #[case] expected_line: usize) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.jsonl");
    let contents = format!(
        "{}\n{bad_line}\n{}\n",
        serde_json::to_string(&snapshot("graph", 1)).unwrap(),
        serde_json::to_string(&snapshot("graph", 2)).unwrap(),
    );
    std::fs::write(&path, contents).unwrap();

    let (records, warnings): (Vec<Snapshot>, _) = read_jsonl_resilient(&path).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(warnings.len(), 1);
    assert!(matches!(warnings[0], Warning::MalformedJson { .. }));
    assert_eq!(warnings[0].line_number(), expected_line);
}

#[tokio::test]
async fn resilient_read_of_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let result: ripple_jsonl::Result<(Vec<Snapshot>, _)> =
        read_jsonl_resilient(dir.path().join("absent.jsonl")).await;
    assert!(matches!(result, Err(ripple_jsonl::Error::Io(_))));
}
