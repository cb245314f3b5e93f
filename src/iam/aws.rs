//! AWS SDK implementation of the directory traits.
//!
//! IAM listings are paginated with `Marker`/`IsTruncated`; every method here
//! follows the marker until the listing is exhausted.

use super::{
    CallerIdentity, DirectoryError, IdentityDirectory, KeyStatus, PolicyAdmin, RawAccessKey,
    UserTags,
};
use crate::utils::time::from_epoch;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_iam::primitives::DateTime as SdkDateTime;
use aws_sdk_iam::types::StatusType;
use chrono::{DateTime, Utc};
use std::error::Error as StdError;
use std::fmt::Debug;
use tracing::debug;

/// IAM and STS clients built from one shared SDK configuration.
#[derive(Debug, Clone)]
pub struct AwsIam {
    iam: aws_sdk_iam::Client,
    sts: aws_sdk_sts::Client,
}

impl AwsIam {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            iam: aws_sdk_iam::Client::new(config),
            sts: aws_sdk_sts::Client::new(config),
        }
    }

    /// Create clients from the standard AWS environment and profile chain.
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        debug!(region = ?config.region(), "loaded AWS configuration");
        Self::new(&config)
    }
}

/// Convert an SDK failure into a [`DirectoryError`].
fn sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> DirectoryError
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
    R: Debug,
{
    let message = DisplayErrorContext(&err).to_string();

    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => DirectoryError::Unavailable {
            operation: operation.to_string(),
            message,
        },
        _ => {
            let code = err.as_service_error().and_then(|e| e.code());
            DirectoryError::from_code(operation, code, message)
        }
    }
}

fn to_utc(operation: &str, value: &SdkDateTime) -> Result<DateTime<Utc>, DirectoryError> {
    from_epoch(value.secs(), value.subsec_nanos()).ok_or_else(|| {
        DirectoryError::malformed(operation, format!("timestamp out of range: {:?}", value))
    })
}

#[async_trait]
impl IdentityDirectory for AwsIam {
    async fn list_users(&self) -> Result<Vec<String>, DirectoryError> {
        const OP: &str = "ListUsers";
        let mut users = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .iam
                .list_users()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| sdk_error(OP, e))?;

            users.extend(page.users().iter().map(|u| u.user_name().to_string()));

            match page.marker() {
                Some(next) if page.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(users)
    }

    async fn list_user_tags(&self, username: &str) -> Result<UserTags, DirectoryError> {
        const OP: &str = "ListUserTags";
        let mut tags = UserTags::default();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .iam
                .list_user_tags()
                .user_name(username)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| sdk_error(OP, e))?;

            for tag in page.tags() {
                tags.insert(tag.key(), tag.value());
            }

            match page.marker() {
                Some(next) if page.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(tags)
    }

    async fn list_access_keys(&self, username: &str) -> Result<Vec<RawAccessKey>, DirectoryError> {
        const OP: &str = "ListAccessKeys";
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .iam
                .list_access_keys()
                .user_name(username)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| sdk_error(OP, e))?;

            for meta in page.access_key_metadata() {
                let access_key_id = meta
                    .access_key_id()
                    .ok_or_else(|| DirectoryError::malformed(OP, "key without AccessKeyId"))?;
                let created = meta.create_date().ok_or_else(|| {
                    DirectoryError::malformed(OP, format!("{access_key_id} has no CreateDate"))
                })?;
                let status = match meta.status() {
                    Some(StatusType::Active) => KeyStatus::Active,
                    other => {
                        if other != Some(&StatusType::Inactive) {
                            debug!(access_key_id, status = ?other, "treating key status as inactive");
                        }
                        KeyStatus::Inactive
                    }
                };

                keys.push(RawAccessKey {
                    access_key_id: access_key_id.to_string(),
                    status,
                    created: to_utc(OP, created)?,
                });
            }

            match page.marker() {
                Some(next) if page.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn access_key_last_used(
        &self,
        access_key_id: &str,
    ) -> Result<Option<DateTime<Utc>>, DirectoryError> {
        const OP: &str = "GetAccessKeyLastUsed";
        let out = self
            .iam
            .get_access_key_last_used()
            .access_key_id(access_key_id)
            .send()
            .await
            .map_err(|e| sdk_error(OP, e))?;

        out.access_key_last_used()
            .and_then(|used| used.last_used_date())
            .map(|date| to_utc(OP, date))
            .transpose()
    }

    async fn probe_access(&self, username: &str) -> Result<(), DirectoryError> {
        self.iam
            .list_users()
            .max_items(1)
            .send()
            .await
            .map_err(|e| sdk_error("ListUsers", e))?;
        self.iam
            .list_access_keys()
            .user_name(username)
            .max_items(1)
            .send()
            .await
            .map_err(|e| sdk_error("ListAccessKeys", e))?;
        Ok(())
    }
}

#[async_trait]
impl PolicyAdmin for AwsIam {
    async fn attached_policy_arns(&self, username: &str) -> Result<Vec<String>, DirectoryError> {
        const OP: &str = "ListAttachedUserPolicies";
        let mut arns = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .iam
                .list_attached_user_policies()
                .user_name(username)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| sdk_error(OP, e))?;

            arns.extend(
                page.attached_policies()
                    .iter()
                    .filter_map(|p| p.policy_arn().map(str::to_string)),
            );

            match page.marker() {
                Some(next) if page.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(arns)
    }

    async fn attach_user_policy(
        &self,
        username: &str,
        policy_arn: &str,
    ) -> Result<(), DirectoryError> {
        self.iam
            .attach_user_policy()
            .user_name(username)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| sdk_error("AttachUserPolicy", e))?;
        Ok(())
    }

    async fn detach_user_policy(
        &self,
        username: &str,
        policy_arn: &str,
    ) -> Result<(), DirectoryError> {
        self.iam
            .detach_user_policy()
            .user_name(username)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| sdk_error("DetachUserPolicy", e))?;
        Ok(())
    }
}

#[async_trait]
impl CallerIdentity for AwsIam {
    async fn account_id(&self) -> Result<String, DirectoryError> {
        const OP: &str = "GetCallerIdentity";
        let out = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| sdk_error(OP, e))?;

        out.account()
            .map(str::to_string)
            .ok_or_else(|| DirectoryError::malformed(OP, "response has no Account"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_sdk_datetime_conversion() {
        let value = SdkDateTime::from_secs_and_nanos(1_760_000_000, 500);
        let dt = to_utc("ListAccessKeys", &value).unwrap();
        assert_eq!(dt.timestamp(), 1_760_000_000);
        assert_eq!(dt.nanosecond(), 500);
        assert_eq!(dt.year(), 2025);
    }
}
