//! Credential enumeration for a single user.
//!
//! Collects what the report needs to know about a user: contact tags and
//! the evaluated access keys. Failures come back as [`DirectoryError`] so the
//! caller can skip the user and carry on with the rest of the account.

use super::evaluator::{evaluate_key, AccessKeyRecord};
use crate::iam::{DirectoryError, IdentityDirectory, RawAccessKey, UserTags};
use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};

/// Everything the report holds about one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAudit {
    pub username: String,
    pub tags: UserTags,
    pub keys: Vec<AccessKeyRecord>,
}

impl UserAudit {
    pub fn email_address(&self) -> Option<&str> {
        self.tags.email_address()
    }

    pub fn employee_id(&self) -> Option<&str> {
        self.tags.employee_id()
    }
}

/// Tags of a user, keyed by tag name.
pub async fn get_user_tags<D>(
    directory: &D,
    retry: &RetryPolicy,
    username: &str,
) -> Result<UserTags, DirectoryError>
where
    D: IdentityDirectory + ?Sized,
{
    retry.run(|| directory.list_user_tags(username)).await
}

/// Access keys of a user in listing order, not yet evaluated.
pub async fn get_access_keys<D>(
    directory: &D,
    retry: &RetryPolicy,
    username: &str,
) -> Result<Vec<RawAccessKey>, DirectoryError>
where
    D: IdentityDirectory + ?Sized,
{
    retry.run(|| directory.list_access_keys(username)).await
}

/// Enumerate and evaluate every access key of `username`.
///
/// Keys are evaluated one at a time in listing order against `now`.
pub async fn audit_user<D>(
    directory: &D,
    retry: &RetryPolicy,
    username: &str,
    now: DateTime<Utc>,
) -> Result<UserAudit, DirectoryError>
where
    D: IdentityDirectory + ?Sized,
{
    let tags = get_user_tags(directory, retry, username).await?;
    let raw_keys = get_access_keys(directory, retry, username).await?;

    let mut keys = Vec::with_capacity(raw_keys.len());
    for raw in raw_keys {
        keys.push(evaluate_key(directory, retry, raw, now).await?);
    }

    Ok(UserAudit {
        username: username.to_string(),
        tags,
        keys,
    })
}
