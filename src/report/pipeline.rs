//! The per-user report loop.
//!
//! Users are processed one at a time in listing order. A failure while
//! auditing one user is logged and recorded in the [`ReportSummary`]; the
//! loop moves on to the next user. Failing to list users or to write the
//! report ends the run.

use super::enumerator::audit_user;
use super::sink::ReportWriter;
use crate::iam::{DirectoryError, IdentityDirectory};
use crate::retry::RetryPolicy;
use crate::utils::progress::ReportProgress;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io::Write;
use tracing::{debug, warn};

/// Values stamped on every row of one report.
#[derive(Debug, Clone)]
pub struct ReportContext {
    /// Environment label exactly as given on the command line
    pub environment: String,
    pub account_id: String,
    /// Reference time for every age in the report
    pub now: DateTime<Utc>,
}

/// Outcome of a report run.
#[derive(Debug, Default)]
pub struct ReportSummary {
    pub users_scanned: usize,
    pub keys_reported: usize,
    pub failed_users: Vec<(String, DirectoryError)>,
}

/// Audit every user of the account and write their keys to `writer`.
pub async fn write_report<D, W, P>(
    directory: &D,
    retry: &RetryPolicy,
    context: &ReportContext,
    writer: &mut ReportWriter<W>,
    progress: &P,
) -> Result<ReportSummary>
where
    D: IdentityDirectory + ?Sized,
    W: Write,
    P: ReportProgress + ?Sized,
{
    let users = retry
        .run(|| directory.list_users())
        .await
        .context("Failed to list IAM users")?;
    debug!(count = users.len(), "listed IAM users");

    let mut summary = ReportSummary::default();

    for username in &users {
        match audit_user(directory, retry, username, context.now).await {
            Ok(audit) => {
                summary.keys_reported +=
                    writer.write_user(&context.environment, &context.account_id, &audit)?;
            }
            Err(err) => {
                warn!(user = %username, error = %err, "skipping user");
                summary.failed_users.push((username.clone(), err));
            }
        }

        summary.users_scanned += 1;
        progress.user_completed(username);
    }

    Ok(summary)
}
