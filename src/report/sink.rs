//! CSV report output.
//!
//! The header row is fixed and written up front, so a report over an account
//! without access keys is still a valid CSV file.

use super::enumerator::UserAudit;
use super::evaluator::AccessKeyRecord;
use crate::utils::time::format_report_date;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Column names of the report, in order.
pub const REPORT_HEADERS: [&str; 9] = [
    "AWSEnvironment",
    "AWSAccountID",
    "UserName",
    "Email",
    "EmployeeID",
    "AccessKeyID",
    "Status",
    "Usage",
    "Age(Days)",
];

/// File name for a report: environment label without spaces plus `MMDDYYYY`.
///
/// Path separators in the label become `-` so the file stays in the output
/// directory.
pub fn report_file_name(environment: &str, date: NaiveDate) -> String {
    let label: String = environment
        .chars()
        .filter(|c| *c != ' ')
        .map(|c| if matches!(c, '/' | '\\') { '-' } else { c })
        .collect();
    format!("{}_{}.csv", label, format_report_date(date))
}

/// One line of the report.
#[derive(Debug, Serialize)]
pub struct ReportRow<'a> {
    pub environment: &'a str,
    pub account_id: &'a str,
    pub username: &'a str,
    pub email: Option<&'a str>,
    pub employee_id: Option<&'a str>,
    pub access_key_id: &'a str,
    pub status: String,
    pub usage: String,
    pub age_days: u64,
}

impl<'a> ReportRow<'a> {
    pub fn new(
        environment: &'a str,
        account_id: &'a str,
        user: &'a UserAudit,
        key: &'a AccessKeyRecord,
    ) -> Self {
        Self {
            environment,
            account_id,
            username: &user.username,
            email: user.email_address(),
            employee_id: user.employee_id(),
            access_key_id: &key.access_key_id,
            status: key.status.to_string(),
            usage: key.usage_info.to_string(),
            age_days: key.age_days,
        }
    }
}

/// Streams report rows to CSV.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl ReportWriter<File> {
    /// Create the report file, truncating any existing one.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Self::new(file)
    }
}

impl<W: Write> ReportWriter<W> {
    /// Wrap a writer and emit the header row.
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer
            .write_record(REPORT_HEADERS)
            .context("Failed to write report header")?;

        Ok(Self { writer })
    }

    /// Write one row per access key of `user`.
    pub fn write_user(
        &mut self,
        environment: &str,
        account_id: &str,
        user: &UserAudit,
    ) -> Result<usize> {
        for key in &user.keys {
            self.writer
                .serialize(ReportRow::new(environment, account_id, user, key))
                .with_context(|| format!("Failed to write row for {}", key.access_key_id))?;
        }
        Ok(user.keys.len())
    }

    /// Flush buffered rows and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush report: {}", e.error()))
    }
}
