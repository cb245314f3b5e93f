//! Key risk evaluation.
//!
//! Turns a listed access key into an [`AccessKeyRecord`]: how old the key is
//! and how long ago it was last used, both in whole days relative to a
//! single reference time.

use crate::iam::{DirectoryError, IdentityDirectory, KeyStatus, RawAccessKey};
use crate::retry::RetryPolicy;
use crate::utils::time::whole_days_between;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::warn;

/// How recently an access key authenticated a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageInfo {
    NeverUsed,
    UsedDaysAgo(u64),
}

impl fmt::Display for UsageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeverUsed => f.write_str("Never used"),
            Self::UsedDaysAgo(days) => write!(f, "Used {} days ago", days),
        }
    }
}

/// Evaluated metadata for one access key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyRecord {
    pub access_key_id: String,
    pub status: KeyStatus,
    pub age_days: u64,
    pub usage_info: UsageInfo,
}

impl AccessKeyRecord {
    /// Evaluate a key against `now` given its last-used time.
    pub fn evaluate(
        key: RawAccessKey,
        last_used: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        if key.created > now {
            warn!(
                access_key_id = %key.access_key_id,
                created = %key.created,
                "key creation time is in the future, reporting age 0"
            );
        }

        let usage_info = match last_used {
            Some(used) => UsageInfo::UsedDaysAgo(whole_days_between(&used, &now)),
            None => UsageInfo::NeverUsed,
        };

        Self {
            age_days: whole_days_between(&key.created, &now),
            access_key_id: key.access_key_id,
            status: key.status,
            usage_info,
        }
    }
}

/// Look up when `key` was last used and evaluate it.
pub async fn evaluate_key<D>(
    directory: &D,
    retry: &RetryPolicy,
    key: RawAccessKey,
    now: DateTime<Utc>,
) -> Result<AccessKeyRecord, DirectoryError>
where
    D: IdentityDirectory + ?Sized,
{
    let last_used = retry
        .run(|| directory.access_key_last_used(&key.access_key_id))
        .await?;

    Ok(AccessKeyRecord::evaluate(key, last_used, now))
}
