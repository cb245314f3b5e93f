//! Access-key audit report command.
//!
//! Lists every IAM user of the account, evaluates each user's access keys,
//! and writes one CSV row per key.
//!
//! # Usage
//!
//! ```bash
//! # Report for an environment, elevating the default audit user
//! iam-key-report "Prod East"
//!
//! # Elevate a different identity and write into a reports directory
//! iam-key-report staging --elevation-user audit-bot --output-dir reports/
//!
//! # Caller already has read access to IAM
//! iam-key-report dev --no-elevation
//! ```
//!
//! # Output
//!
//! `{environment}_{MMDDYYYY}.csv` with spaces removed from the environment
//! label, columns:
//! - AWSEnvironment, AWSAccountID, UserName
//! - Email, EmployeeID (from the `email` and `employeeID` user tags)
//! - AccessKeyID, Status, Usage, Age(Days)

use crate::config::{AuditConfig, ReportOptions};
use crate::elevation::with_elevation;
use crate::iam::aws::AwsIam;
use crate::iam::{CallerIdentity, IdentityDirectory, PolicyAdmin};
use crate::report::{report_file_name, write_report, ReportContext, ReportSummary, ReportWriter};
use crate::utils::progress::{ReportProgress, ScanProgress};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::path::PathBuf;
use tracing::info;

/// Where and when a report run happens.
#[derive(Debug, Clone)]
pub struct RunClock {
    /// Reference time for key ages and usage
    pub now: DateTime<Utc>,
    /// Local calendar date used in the file name
    pub local_date: NaiveDate,
}

impl RunClock {
    /// Capture the current time once for the whole run.
    pub fn capture() -> Self {
        Self {
            now: Utc::now(),
            local_date: Local::now().date_naive(),
        }
    }
}

/// Result of a completed report run.
#[derive(Debug)]
pub struct ReportOutcome {
    pub path: PathBuf,
    pub summary: ReportSummary,
}

pub async fn run(environment: &str, options: &ReportOptions) -> Result<()> {
    let config = AuditConfig::from_options(options)?;
    let aws = AwsIam::from_env().await;
    let progress = ScanProgress::new("Scanning IAM users");

    eprintln!("=== IAM Access Key Report ===");
    eprintln!("Environment: {}", environment);
    match &config.elevation {
        Some(elevation) => eprintln!(
            "Elevating {} with {}",
            elevation.username, elevation.policy_arn
        ),
        None => eprintln!("Elevation disabled"),
    }
    eprintln!();

    let clock = RunClock::capture();
    let result = run_with(&aws, &aws, &aws, &config, environment, &clock, &progress).await;
    let outcome = settle_progress(&progress, result)?;

    let summary = &outcome.summary;
    eprintln!();
    eprintln!("=== Summary ===");
    eprintln!("Users scanned: {}", summary.users_scanned);
    eprintln!("Access keys reported: {}", summary.keys_reported);
    if !summary.failed_users.is_empty() {
        eprintln!("Users skipped after errors: {}", summary.failed_users.len());
        for (user, err) in &summary.failed_users {
            eprintln!("  {}: {}", user, err);
        }
    }
    eprintln!("CSV written to: {}", outcome.path.display());

    Ok(())
}

/// Close the spinner whether the run succeeded or not.
fn settle_progress<T>(progress: &ScanProgress, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => progress.finish_with_message("Scan complete"),
        Err(_) => progress.abandon_with_message("Scan failed"),
    }
    result
}

/// Produce the report against the given services.
///
/// Elevation, when configured, wraps everything from opening the output
/// file to the last row, and is released before this returns.
pub async fn run_with<D, A, C, P>(
    directory: &D,
    admin: &A,
    caller: &C,
    config: &AuditConfig,
    environment: &str,
    clock: &RunClock,
    progress: &P,
) -> Result<ReportOutcome>
where
    D: IdentityDirectory + ?Sized,
    A: PolicyAdmin + ?Sized,
    C: CallerIdentity + ?Sized,
    P: ReportProgress + ?Sized,
{
    let scan = generate(directory, caller, config, environment, clock, progress);

    match &config.elevation {
        Some(settings) => with_elevation(admin, directory, settings, scan).await,
        None => scan.await,
    }
}

async fn generate<D, C, P>(
    directory: &D,
    caller: &C,
    config: &AuditConfig,
    environment: &str,
    clock: &RunClock,
    progress: &P,
) -> Result<ReportOutcome>
where
    D: IdentityDirectory + ?Sized,
    C: CallerIdentity + ?Sized,
    P: ReportProgress + ?Sized,
{
    let path = config
        .output_dir
        .join(report_file_name(environment, clock.local_date));
    let mut writer = ReportWriter::create(&path)?;

    let account_id = config
        .retry
        .run(|| caller.account_id())
        .await
        .context("Failed to resolve caller account")?;
    info!(account = %account_id, "resolved caller account");

    let context = ReportContext {
        environment: environment.to_string(),
        account_id,
        now: clock.now,
    };
    let summary = write_report(directory, &config.retry, &context, &mut writer, progress).await?;
    writer.finish()?;

    Ok(ReportOutcome { path, summary })
}
