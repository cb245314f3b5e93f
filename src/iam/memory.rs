//! In-memory account used in place of AWS.
//!
//! Holds a fixed set of users, tags and keys, records every policy change,
//! and can be told to fail specific calls so error paths can be exercised.
//!
//! ```
//! use iam_key_audit::iam::memory::{InMemoryDirectory, InMemoryUser};
//!
//! let directory = InMemoryDirectory::new("123456789012")
//!     .with_user(InMemoryUser::new("alice").tag("email", "alice@example.com"));
//! ```

use super::{
    CallerIdentity, DirectoryError, IdentityDirectory, PolicyAdmin, RawAccessKey, UserTags,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// An error served for a number of calls, then cleared.
#[derive(Debug, Clone)]
struct InjectedFailure {
    error: DirectoryError,
    remaining: usize,
}

#[derive(Debug, Clone)]
struct InMemoryKey {
    raw: RawAccessKey,
    last_used: Option<DateTime<Utc>>,
}

/// One user of the in-memory account.
#[derive(Debug, Clone)]
pub struct InMemoryUser {
    name: String,
    tags: UserTags,
    keys: Vec<InMemoryKey>,
}

impl InMemoryUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: UserTags::default(),
            keys: Vec::new(),
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key, value);
        self
    }

    pub fn key(mut self, raw: RawAccessKey, last_used: Option<DateTime<Utc>>) -> Self {
        self.keys.push(InMemoryKey { raw, last_used });
        self
    }
}

/// Directory, policy admin and caller identity backed by memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    account_id: String,
    users: Vec<InMemoryUser>,
    key_listing_failures: HashMap<String, DirectoryError>,
    tag_failures: Mutex<HashMap<String, InjectedFailure>>,
    last_used_failures: HashMap<String, DirectoryError>,
    user_listing_failure: Option<DirectoryError>,
    policy_listing_failure: Option<DirectoryError>,
    detach_failure: Option<DirectoryError>,
    attached: Mutex<HashMap<String, Vec<String>>>,
    denied_probes: AtomicUsize,
    events: Mutex<Vec<String>>,
}

impl InMemoryDirectory {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user: InMemoryUser) -> Self {
        self.users.push(user);
        self
    }

    /// Make `ListAccessKeys` fail for one user.
    pub fn with_key_listing_failure(
        mut self,
        username: impl Into<String>,
        error: DirectoryError,
    ) -> Self {
        self.key_listing_failures.insert(username.into(), error);
        self
    }

    /// Make `ListUserTags` fail for one user.
    pub fn with_tag_failure(self, username: impl Into<String>, error: DirectoryError) -> Self {
        self.with_flaky_tags(username, error, usize::MAX)
    }

    /// Make `ListUserTags` fail for one user on its first `times` calls only.
    pub fn with_flaky_tags(
        self,
        username: impl Into<String>,
        error: DirectoryError,
        times: usize,
    ) -> Self {
        lock(&self.tag_failures).insert(
            username.into(),
            InjectedFailure {
                error,
                remaining: times,
            },
        );
        self
    }

    /// Make `GetAccessKeyLastUsed` fail for one key.
    pub fn with_last_used_failure(
        mut self,
        access_key_id: impl Into<String>,
        error: DirectoryError,
    ) -> Self {
        self.last_used_failures.insert(access_key_id.into(), error);
        self
    }

    /// Make `ListUsers` fail.
    pub fn with_user_listing_failure(mut self, error: DirectoryError) -> Self {
        self.user_listing_failure = Some(error);
        self
    }

    /// Make `ListAttachedUserPolicies` fail.
    pub fn with_policy_listing_failure(mut self, error: DirectoryError) -> Self {
        self.policy_listing_failure = Some(error);
        self
    }

    /// Make `DetachUserPolicy` fail.
    pub fn with_detach_failure(mut self, error: DirectoryError) -> Self {
        self.detach_failure = Some(error);
        self
    }

    /// Start with a policy already attached to a user.
    pub fn with_attached_policy(self, username: &str, policy_arn: &str) -> Self {
        lock(&self.attached)
            .entry(username.to_string())
            .or_default()
            .push(policy_arn.to_string());
        self
    }

    /// Deny this many access probes before granting access.
    pub fn with_propagation_delay(self, denied_probes: usize) -> Self {
        self.denied_probes.store(denied_probes, Ordering::SeqCst);
        self
    }

    pub fn attached_policies(&self, username: &str) -> Vec<String> {
        lock(&self.attached).get(username).cloned().unwrap_or_default()
    }

    /// Policy and probe calls in the order they happened, e.g. `attach:sre:arn`.
    pub fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }

    fn record(&self, event: String) {
        lock(&self.events).push(event);
    }

    fn user(&self, operation: &str, username: &str) -> Result<&InMemoryUser, DirectoryError> {
        self.users
            .iter()
            .find(|u| u.name == username)
            .ok_or_else(|| {
                DirectoryError::from_code(
                    operation,
                    Some("NoSuchEntity"),
                    format!("The user with name {username} cannot be found."),
                )
            })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn list_users(&self) -> Result<Vec<String>, DirectoryError> {
        if let Some(err) = &self.user_listing_failure {
            return Err(err.clone());
        }
        Ok(self.users.iter().map(|u| u.name.clone()).collect())
    }

    async fn list_user_tags(&self, username: &str) -> Result<UserTags, DirectoryError> {
        if let Some(failure) = lock(&self.tag_failures).get_mut(username) {
            if failure.remaining > 0 {
                failure.remaining -= 1;
                return Err(failure.error.clone());
            }
        }
        Ok(self.user("ListUserTags", username)?.tags.clone())
    }

    async fn list_access_keys(&self, username: &str) -> Result<Vec<RawAccessKey>, DirectoryError> {
        if let Some(err) = self.key_listing_failures.get(username) {
            return Err(err.clone());
        }
        Ok(self
            .user("ListAccessKeys", username)?
            .keys
            .iter()
            .map(|k| k.raw.clone())
            .collect())
    }

    async fn access_key_last_used(
        &self,
        access_key_id: &str,
    ) -> Result<Option<DateTime<Utc>>, DirectoryError> {
        if let Some(err) = self.last_used_failures.get(access_key_id) {
            return Err(err.clone());
        }
        self.users
            .iter()
            .flat_map(|u| u.keys.iter())
            .find(|k| k.raw.access_key_id == access_key_id)
            .map(|k| k.last_used)
            .ok_or_else(|| {
                DirectoryError::from_code(
                    "GetAccessKeyLastUsed",
                    Some("NoSuchEntity"),
                    format!("The Access Key with id {access_key_id} cannot be found."),
                )
            })
    }

    async fn probe_access(&self, username: &str) -> Result<(), DirectoryError> {
        self.record(format!("probe:{username}"));
        let remaining = self.denied_probes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.denied_probes.store(remaining - 1, Ordering::SeqCst);
            return Err(DirectoryError::from_code(
                "ListUsers",
                Some("AccessDenied"),
                "policy not yet effective",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyAdmin for InMemoryDirectory {
    async fn attached_policy_arns(&self, username: &str) -> Result<Vec<String>, DirectoryError> {
        if let Some(err) = &self.policy_listing_failure {
            return Err(err.clone());
        }
        Ok(self.attached_policies(username))
    }

    async fn attach_user_policy(
        &self,
        username: &str,
        policy_arn: &str,
    ) -> Result<(), DirectoryError> {
        self.record(format!("attach:{username}:{policy_arn}"));
        let mut attached = lock(&self.attached);
        let policies = attached.entry(username.to_string()).or_default();
        if !policies.iter().any(|p| p == policy_arn) {
            policies.push(policy_arn.to_string());
        }
        Ok(())
    }

    async fn detach_user_policy(
        &self,
        username: &str,
        policy_arn: &str,
    ) -> Result<(), DirectoryError> {
        self.record(format!("detach:{username}:{policy_arn}"));
        if let Some(err) = &self.detach_failure {
            return Err(err.clone());
        }
        let mut attached = lock(&self.attached);
        let policies = attached.get_mut(username).ok_or_else(|| {
            DirectoryError::from_code(
                "DetachUserPolicy",
                Some("NoSuchEntity"),
                format!("Policy {policy_arn} was not found."),
            )
        })?;
        policies.retain(|p| p != policy_arn);
        Ok(())
    }
}

#[async_trait]
impl CallerIdentity for InMemoryDirectory {
    async fn account_id(&self) -> Result<String, DirectoryError> {
        Ok(self.account_id.clone())
    }
}
