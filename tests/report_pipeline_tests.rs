/// End-to-end tests for the report loop against an in-memory account
use chrono::{DateTime, Duration, Utc};
use iam_key_audit::iam::memory::{InMemoryDirectory, InMemoryUser};
use iam_key_audit::iam::{DirectoryError, KeyStatus, RawAccessKey};
use iam_key_audit::report::{write_report, ReportContext, ReportWriter};
use iam_key_audit::retry::RetryPolicy;
use iam_key_audit::utils::progress::ReportProgress;
use iam_key_audit::utils::time::parse_timestamp;
use std::cell::RefCell;

/// Progress sink that remembers which users completed
#[derive(Default)]
struct RecordingProgress {
    users: RefCell<Vec<String>>,
}

impl ReportProgress for RecordingProgress {
    fn user_completed(&self, username: &str) {
        self.users.borrow_mut().push(username.to_string());
    }
}

fn now() -> DateTime<Utc> {
    parse_timestamp("2025-10-17T15:30:00Z").unwrap()
}

fn key(id: &str, age_days: i64, status: KeyStatus) -> RawAccessKey {
    RawAccessKey {
        access_key_id: id.to_string(),
        status,
        created: now() - Duration::days(age_days),
    }
}

fn context() -> ReportContext {
    ReportContext {
        environment: "Prod East".to_string(),
        account_id: "123456789012".to_string(),
        now: now(),
    }
}

/// Run the pipeline and return (summary, csv lines, progress)
async fn run_report(
    directory: &InMemoryDirectory,
) -> (
    iam_key_audit::report::ReportSummary,
    Vec<String>,
    Vec<String>,
) {
    let progress = RecordingProgress::default();
    let mut writer = ReportWriter::new(Vec::new()).unwrap();
    let summary = write_report(
        directory,
        &RetryPolicy::none(),
        &context(),
        &mut writer,
        &progress,
    )
    .await
    .unwrap();

    let csv = String::from_utf8(writer.finish().unwrap()).unwrap();
    let lines = csv.lines().map(str::to_string).collect();
    (summary, lines, progress.users.into_inner())
}

#[tokio::test]
async fn test_never_used_key_and_user_without_keys() {
    let directory = InMemoryDirectory::new("123456789012")
        .with_user(InMemoryUser::new("alice").key(key("AKIAALICE", 10, KeyStatus::Active), None))
        .with_user(InMemoryUser::new("bob"));

    let (summary, lines, users) = run_report(&directory).await;

    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        "AWSEnvironment,AWSAccountID,UserName,Email,EmployeeID,AccessKeyID,Status,Usage,Age(Days)"
    );
    assert_eq!(
        lines[1],
        "Prod East,123456789012,alice,,,AKIAALICE,Active,Never used,10"
    );
    assert_eq!(users, ["alice", "bob"]);
    assert_eq!(summary.users_scanned, 2);
    assert_eq!(summary.keys_reported, 1);
    assert!(summary.failed_users.is_empty());
}

#[tokio::test]
async fn test_recently_used_key() {
    let directory = InMemoryDirectory::new("123456789012").with_user(
        InMemoryUser::new("svc-deploy")
            .tag("email", "deploy@example.com")
            .tag("employeeID", "E-42")
            .key(
                key("AKIADEPLOY", 30, KeyStatus::Active),
                Some(now() - Duration::days(5)),
            ),
    );

    let (_, lines, _) = run_report(&directory).await;

    assert_eq!(
        lines[1],
        "Prod East,123456789012,svc-deploy,deploy@example.com,E-42,AKIADEPLOY,Active,Used 5 days ago,30"
    );
}

#[tokio::test]
async fn test_one_row_per_key() {
    let directory = InMemoryDirectory::new("123456789012")
        .with_user(
            InMemoryUser::new("alice")
                .key(key("AKIA1", 400, KeyStatus::Inactive), None)
                .key(key("AKIA2", 3, KeyStatus::Active), Some(now())),
        )
        .with_user(InMemoryUser::new("bob").key(key("AKIA3", 90, KeyStatus::Active), None));

    let (summary, lines, _) = run_report(&directory).await;

    assert_eq!(summary.keys_reported, 3);
    assert_eq!(lines.len(), 4);
    assert!(lines[1].contains("AKIA1,Inactive,Never used,400"));
    assert!(lines[2].contains("AKIA2,Active,Used 0 days ago,3"));
    assert!(lines[3].starts_with("Prod East,123456789012,bob,"));
}

#[tokio::test]
async fn test_failed_user_does_not_stop_the_scan() {
    let directory = InMemoryDirectory::new("123456789012")
        .with_user(InMemoryUser::new("alice").key(key("AKIAA", 1, KeyStatus::Active), None))
        .with_user(InMemoryUser::new("bob").key(key("AKIAB", 2, KeyStatus::Active), None))
        .with_user(InMemoryUser::new("carol").key(key("AKIAC", 3, KeyStatus::Active), None))
        .with_key_listing_failure(
            "bob",
            DirectoryError::from_code("ListAccessKeys", Some("AccessDenied"), "denied"),
        );

    let (summary, lines, users) = run_report(&directory).await;

    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains(",alice,"));
    assert!(lines[2].contains(",carol,"));
    assert!(!lines.iter().any(|l| l.contains(",bob,")));
    assert_eq!(users, ["alice", "bob", "carol"]);

    assert_eq!(summary.failed_users.len(), 1);
    assert_eq!(summary.failed_users[0].0, "bob");
    assert!(summary.failed_users[0].1.is_permission_denied());
}

#[tokio::test]
async fn test_tag_lookup_failure_skips_only_that_user() {
    let directory = InMemoryDirectory::new("123456789012")
        .with_user(InMemoryUser::new("alice").key(key("AKIAA", 1, KeyStatus::Active), None))
        .with_user(InMemoryUser::new("bob").key(key("AKIAB", 2, KeyStatus::Active), None))
        .with_user(InMemoryUser::new("carol").key(key("AKIAC", 3, KeyStatus::Active), None))
        .with_tag_failure(
            "bob",
            DirectoryError::from_code("ListUserTags", Some("AccessDenied"), "denied"),
        );

    let (summary, lines, users) = run_report(&directory).await;

    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains(",alice,"));
    assert!(lines[2].contains(",carol,"));
    assert_eq!(users, ["alice", "bob", "carol"]);
    assert_eq!(summary.keys_reported, 2);
    assert_eq!(summary.failed_users.len(), 1);
    assert_eq!(summary.failed_users[0].0, "bob");
    assert_eq!(summary.failed_users[0].1.operation(), "ListUserTags");
}

#[tokio::test]
async fn test_last_used_failure_drops_all_rows_of_the_user() {
    let directory = InMemoryDirectory::new("123456789012")
        .with_user(InMemoryUser::new("alice").key(key("AKIAA", 1, KeyStatus::Active), None))
        .with_user(
            InMemoryUser::new("bob")
                .key(key("AKIAB1", 20, KeyStatus::Active), Some(now()))
                .key(key("AKIAB2", 2, KeyStatus::Active), None),
        )
        .with_user(InMemoryUser::new("carol").key(key("AKIAC", 3, KeyStatus::Active), None))
        .with_last_used_failure(
            "AKIAB2",
            DirectoryError::from_code("GetAccessKeyLastUsed", Some("ServiceFailure"), "boom"),
        );

    let (summary, lines, users) = run_report(&directory).await;

    assert_eq!(lines.len(), 3);
    assert!(!lines.iter().any(|l| l.contains(",bob,")));
    assert!(lines[1].contains(",alice,"));
    assert!(lines[2].contains(",carol,"));
    assert_eq!(users, ["alice", "bob", "carol"]);
    assert_eq!(summary.keys_reported, 2);
    assert_eq!(summary.failed_users.len(), 1);
    assert_eq!(summary.failed_users[0].0, "bob");
    assert_eq!(summary.failed_users[0].1.operation(), "GetAccessKeyLastUsed");
}

#[tokio::test]
async fn test_throttled_tag_lookup_is_retried() {
    let directory = InMemoryDirectory::new("123456789012")
        .with_user(
            InMemoryUser::new("alice")
                .tag("email", "alice@example.com")
                .key(key("AKIAA", 4, KeyStatus::Active), None),
        )
        .with_flaky_tags(
            "alice",
            DirectoryError::from_code("ListUserTags", Some("Throttling"), "rate exceeded"),
            2,
        );
    let retry = RetryPolicy {
        max_attempts: 3,
        base_delay: std::time::Duration::ZERO,
        max_delay: std::time::Duration::ZERO,
    };

    let audit = iam_key_audit::report::enumerator::audit_user(&directory, &retry, "alice", now())
        .await
        .unwrap();

    assert_eq!(audit.email_address(), Some("alice@example.com"));
    assert_eq!(audit.keys.len(), 1);
}

#[tokio::test]
async fn test_usage_never_exceeds_age() {
    let directory = InMemoryDirectory::new("123456789012").with_user(
        InMemoryUser::new("alice")
            .key(key("AKIA1", 30, KeyStatus::Active), Some(now() - Duration::days(29)))
            .key(key("AKIA2", 7, KeyStatus::Active), Some(now() - Duration::hours(3)))
            .key(key("AKIA3", 0, KeyStatus::Active), Some(now())),
    );

    let audit = iam_key_audit::report::enumerator::audit_user(
        &directory,
        &RetryPolicy::none(),
        "alice",
        now(),
    )
    .await
    .unwrap();

    for record in &audit.keys {
        if let iam_key_audit::report::UsageInfo::UsedDaysAgo(days) = record.usage_info {
            assert!(days <= record.age_days, "{}", record.access_key_id);
        }
    }
}

#[tokio::test]
async fn test_user_listing_failure_is_fatal() {
    let directory = InMemoryDirectory::new("123456789012").with_user_listing_failure(
        DirectoryError::from_code("ListUsers", Some("AccessDenied"), "denied"),
    );

    let progress = RecordingProgress::default();
    let mut writer = ReportWriter::new(Vec::new()).unwrap();
    let result = write_report(
        &directory,
        &RetryPolicy::none(),
        &context(),
        &mut writer,
        &progress,
    )
    .await;

    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Failed to list IAM users"));
}

#[tokio::test]
async fn test_empty_account_writes_header_only() {
    let directory = InMemoryDirectory::new("123456789012");

    let (summary, lines, users) = run_report(&directory).await;

    assert_eq!(lines.len(), 1);
    assert!(users.is_empty());
    assert_eq!(summary.users_scanned, 0);
}
