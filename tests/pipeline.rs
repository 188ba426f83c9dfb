// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Search sources -> aggregator -> tracker -> CSV export

use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

use asmf::context::AppContext;
use asmf::search::SearchOptions;
use asmf::tracker::Status;
use asmf::AppConfig;

fn write_json(path: &Path, value: serde_json::Value) {
    std::fs::write(path, serde_json::to_string(&value).unwrap()).unwrap();
}

fn context(dir: &TempDir) -> AppContext {
    let jobs = dir.path().join("jobs.json");
    let mirror = dir.path().join("mirror.json");
    let disabled = dir.path().join("disabled.json");

    write_json(
        &jobs,
        json!([
            {"id": 1, "title": "Rust engineer", "description": "Async services", "link": "https://jobs.example/1",
             "metadata": {"company": "Acme", "salary": 120}},
            {"id": 2, "title": "Rust intern", "description": "Learn Rust", "link": "https://spam.example/2",
             "metadata": {"company": "Spamco", "salary": 30}},
            {"id": 3, "title": "", "description": "missing title", "link": "https://jobs.example/3"}
        ]),
    );
    write_json(
        &mirror,
        json!({"results": [
            {"id": "m1", "title": "Rust engineer", "description": "Async services", "link": "https://mirror.example/1",
             "metadata": {"company": "Acme", "salary": 120}},
            {"id": "m2", "title": "Rust lead", "description": "Team lead", "link": "https://mirror.example/2",
             "metadata": {"company": "Initech", "salary": 150}}
        ]}),
    );
    write_json(&disabled, json!([{"id": "d", "title": "Rust ghost", "link": "https://ghost.example"}]));

    let mut config = AppConfig::from_json_str(
        &json!({
            "providers": {
                "jobs": {"enabled": true, "kind": "file", "path": jobs},
                "mirror": {"enabled": true, "kind": "file", "path": mirror},
                "ghost": {"enabled": false, "kind": "file", "path": disabled}
            },
            "blocked_entities": [{"type": "site", "value": "SPAM.example", "reason": "spam"}]
        })
        .to_string(),
    )
    .unwrap();
    config.tracking.storage_path = dir.path().join("data/tracked.json").to_string_lossy().to_string();

    AppContext::new(config, &dir.path().join("config.json"))
}

#[tokio::test]
async fn aggregated_results_are_filtered_deduplicated_and_sorted() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let aggregator = ctx.aggregator().unwrap();
    assert_eq!(aggregator.provider_names().len(), 2);

    let options = SearchOptions { count: 10, deduplicate: true, sort_by: Some("salary".to_string()) };
    let results = aggregator.search("rust", &options).await;

    let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Rust lead", "Rust engineer"]);
    assert_eq!(results[1].id, "1");
    assert_eq!(results[1].source, "jobs");

    let options = SearchOptions { count: 10, deduplicate: false, sort_by: Some("-salary".to_string()) };
    let results = aggregator.search("rust", &options).await;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].title, "Rust engineer");
    assert_eq!(results[2].title, "Rust lead");
}

#[tokio::test]
async fn tracked_results_export_to_csv() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let results = ctx.aggregator().unwrap().search("rust", &SearchOptions::default()).await;

    let mut tracker = ctx.tracker().unwrap();
    for result in &results {
        assert!(tracker.track_result(result, Status::New).unwrap().is_some());
    }
    for result in &results {
        assert!(tracker.track_result(result, Status::New).unwrap().is_none());
    }

    let first = tracker.get_all(None)[0].id.clone();
    tracker.update_status(&first, Status::InProgress, Some("applied")).unwrap();

    let reopened = ctx.tracker().unwrap();
    let stats = reopened.stats();
    assert_eq!(stats[&Status::New], results.len() - 1);
    assert_eq!(stats[&Status::InProgress], 1);

    let csv_path = dir.path().join("export.csv");
    assert_eq!(reopened.export_csv(&csv_path, Some(Status::InProgress)).unwrap(), 1);
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.split(',').any(|c| c == "title"));
    assert!(header.split(',').any(|c| c == "status"));
    assert!(!header.contains("history"));
    assert!(csv.contains("in_progress"));

    let empty = dir.path().join("none.csv");
    assert_eq!(reopened.export_csv(&empty, Some(Status::Rejected)).unwrap(), 0);
    assert!(!empty.exists());
}
