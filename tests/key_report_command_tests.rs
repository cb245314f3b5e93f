use chrono::{Duration, NaiveDate};
use iam_key_audit::commands::key_report::{run_with, RunClock};
use iam_key_audit::config::{AuditConfig, ReportOptions};
use iam_key_audit::iam::memory::{InMemoryDirectory, InMemoryUser};
use iam_key_audit::iam::{KeyStatus, RawAccessKey};
use iam_key_audit::utils::progress::ReportProgress;
use iam_key_audit::utils::time::parse_timestamp;
use std::fs;
use tempfile::TempDir;

struct QuietProgress;

impl ReportProgress for QuietProgress {
    fn user_completed(&self, _username: &str) {}
}

fn clock() -> RunClock {
    RunClock {
        now: parse_timestamp("2025-10-17T12:00:00Z").unwrap(),
        local_date: NaiveDate::from_ymd_opt(2025, 10, 17).unwrap(),
    }
}

fn account() -> InMemoryDirectory {
    let created = clock().now - Duration::days(10);
    InMemoryDirectory::new("210987654321").with_user(
        InMemoryUser::new("alice").key(
            RawAccessKey {
                access_key_id: "AKIAALICE".to_string(),
                status: KeyStatus::Active,
                created,
            },
            None,
        ),
    )
}

fn config(dir: &TempDir, no_elevation: bool) -> AuditConfig {
    let options = ReportOptions {
        no_elevation,
        output_dir: Some(dir.path().to_path_buf()),
        propagation_timeout_secs: Some(0),
        ..ReportOptions::default()
    };
    let mut config = AuditConfig::resolve(&options, |_| None).unwrap();
    if let Some(elevation) = config.elevation.as_mut() {
        elevation.poll_interval = std::time::Duration::ZERO;
        elevation.fallback_delay = std::time::Duration::ZERO;
    }
    config
}

#[tokio::test]
async fn test_report_file_written_with_raw_environment_label() {
    let dir = TempDir::new().unwrap();
    let directory = account();

    let outcome = run_with(
        &directory,
        &directory,
        &directory,
        &config(&dir, true),
        "Prod East",
        &clock(),
        &QuietProgress,
    )
    .await
    .unwrap();

    assert_eq!(outcome.path, dir.path().join("ProdEast_10172025.csv"));
    let content = fs::read_to_string(&outcome.path).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[1],
        "Prod East,210987654321,alice,,,AKIAALICE,Active,Never used,10"
    );
    assert!(directory.events().is_empty());
}

#[tokio::test]
async fn test_elevation_wraps_the_scan() {
    let dir = TempDir::new().unwrap();
    let directory = account();

    let outcome = run_with(
        &directory,
        &directory,
        &directory,
        &config(&dir, false),
        "staging",
        &clock(),
        &QuietProgress,
    )
    .await
    .unwrap();

    assert_eq!(outcome.summary.keys_reported, 1);
    let events = directory.events();
    assert!(events.first().is_some_and(|e| e.starts_with("attach:sre-cli-user:")));
    assert!(events.last().is_some_and(|e| e.starts_with("detach:sre-cli-user:")));
    assert!(directory.attached_policies("sre-cli-user").is_empty());
}

#[tokio::test]
async fn test_unwritable_output_still_detaches() {
    let dir = TempDir::new().unwrap();
    let directory = account();
    let mut config = config(&dir, false);
    config.output_dir = dir.path().join("missing").join("nested");

    let result = run_with(
        &directory,
        &directory,
        &directory,
        &config,
        "dev",
        &clock(),
        &QuietProgress,
    )
    .await;

    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Failed to create output file"));
    assert!(directory.attached_policies("sre-cli-user").is_empty());
}
