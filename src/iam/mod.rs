//! Identity directory abstractions.
//!
//! The report pipeline never talks to AWS directly. It goes through the
//! traits defined here, which are implemented by:
//!
//! - [`aws::AwsIam`] - IAM and STS through the AWS SDK
//! - [`memory::InMemoryDirectory`] - a fixed in-memory account, used by tests
//!
//! All operations return [`DirectoryError`] on failure.

pub mod aws;
pub mod error;
pub mod memory;

pub use error::DirectoryError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

/// Tag key holding a user's contact address.
pub const EMAIL_TAG: &str = "email";

/// Tag key holding a user's employee number.
pub const EMPLOYEE_ID_TAG: &str = "employeeID";

/// Status of an access key as reported by IAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Active,
    Inactive,
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("Active"),
            Self::Inactive => f.write_str("Inactive"),
        }
    }
}

/// An access key as listed for a user, before evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAccessKey {
    pub access_key_id: String,
    pub status: KeyStatus,
    pub created: DateTime<Utc>,
}

/// Tags attached to one IAM user.
///
/// Absent tags are simply not present; lookups never fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserTags(HashMap<String, String>);

impl UserTags {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value of the `email` tag, if the user has one.
    pub fn email_address(&self) -> Option<&str> {
        self.get(EMAIL_TAG)
    }

    /// Value of the `employeeID` tag, if the user has one.
    pub fn employee_id(&self) -> Option<&str> {
        self.get(EMPLOYEE_ID_TAG)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UserTags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Read access to users, their tags and their access keys.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// All user names in the account, across every page of the listing.
    async fn list_users(&self) -> Result<Vec<String>, DirectoryError>;

    async fn list_user_tags(&self, username: &str) -> Result<UserTags, DirectoryError>;

    /// Access keys of a user in listing order. Empty when the user has none.
    async fn list_access_keys(&self, username: &str) -> Result<Vec<RawAccessKey>, DirectoryError>;

    /// When the key last authenticated a request, if ever.
    async fn access_key_last_used(
        &self,
        access_key_id: &str,
    ) -> Result<Option<DateTime<Utc>>, DirectoryError>;

    /// Cheap read that succeeds once the caller may enumerate keys.
    ///
    /// Used to detect when a freshly attached policy has taken effect.
    async fn probe_access(&self, username: &str) -> Result<(), DirectoryError>;
}

/// Managed-policy attachment for a single user.
#[async_trait]
pub trait PolicyAdmin: Send + Sync {
    async fn attached_policy_arns(&self, username: &str) -> Result<Vec<String>, DirectoryError>;

    async fn attach_user_policy(&self, username: &str, policy_arn: &str)
        -> Result<(), DirectoryError>;

    async fn detach_user_policy(&self, username: &str, policy_arn: &str)
        -> Result<(), DirectoryError>;
}

/// Resolves who is calling.
#[async_trait]
pub trait CallerIdentity: Send + Sync {
    async fn account_id(&self) -> Result<String, DirectoryError>;
}
