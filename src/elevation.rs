//! Temporary admin-policy elevation.
//!
//! The scan needs read access to every user in the account. The running
//! identity gets a managed policy attached for the duration of the scan and
//! detached afterwards. [`with_elevation`] owns that sequence so the detach
//! happens on every path out of the scan once the attach succeeded.
//!
//! After attaching, IAM takes a while to honour the policy. Rather than
//! sleeping blindly, the directory is probed until access works; only if the
//! probe keeps failing past the timeout does it fall back to a fixed delay.

use crate::iam::{IdentityDirectory, PolicyAdmin};
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Managed policy granting full administrative access.
pub const ADMINISTRATOR_ACCESS_ARN: &str = "arn:aws:iam::aws:policy/AdministratorAccess";

/// Default identity that runs the audit.
pub const DEFAULT_ELEVATION_USER: &str = "sre-cli-user";

/// Who to elevate, with what, and how long to wait for it to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevationSettings {
    pub username: String,
    pub policy_arn: String,
    pub poll_interval: Duration,
    pub propagation_timeout: Duration,
    /// Wait applied when the probe never succeeds within the timeout
    pub fallback_delay: Duration,
}

impl Default for ElevationSettings {
    fn default() -> Self {
        Self {
            username: DEFAULT_ELEVATION_USER.to_string(),
            policy_arn: ADMINISTRATOR_ACCESS_ARN.to_string(),
            poll_interval: Duration::from_secs(2),
            propagation_timeout: Duration::from_secs(60),
            fallback_delay: Duration::from_secs(10),
        }
    }
}

/// An attached elevation policy that must be released.
#[derive(Debug)]
#[must_use = "an elevated session must be released"]
pub struct ElevatedSession {
    username: String,
    policy_arn: String,
    /// False when the policy was already attached before this run
    owned: bool,
}

impl ElevatedSession {
    /// Attach the policy unless the user already has it.
    pub async fn acquire<A>(admin: &A, settings: &ElevationSettings) -> Result<Self>
    where
        A: PolicyAdmin + ?Sized,
    {
        // The caller may only be allowed to attach and detach.
        let attached = match admin.attached_policy_arns(&settings.username).await {
            Ok(arns) => arns,
            Err(err) if err.is_permission_denied() => {
                warn!(
                    user = %settings.username,
                    error = %err,
                    "cannot list attached policies, attaching without checking"
                );
                Vec::new()
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to list policies of {}", settings.username))
            }
        };

        let owned = if attached.iter().any(|arn| arn == &settings.policy_arn) {
            info!(
                user = %settings.username,
                policy = %settings.policy_arn,
                "policy already attached, leaving it in place"
            );
            false
        } else {
            admin
                .attach_user_policy(&settings.username, &settings.policy_arn)
                .await
                .with_context(|| {
                    format!(
                        "Failed to attach {} to {}",
                        settings.policy_arn, settings.username
                    )
                })?;
            info!(user = %settings.username, policy = %settings.policy_arn, "attached temporary policy");
            true
        };

        Ok(Self {
            username: settings.username.clone(),
            policy_arn: settings.policy_arn.clone(),
            owned,
        })
    }

    /// Whether this session attached the policy itself.
    pub fn owns_attachment(&self) -> bool {
        self.owned
    }

    /// Poll the directory until the elevated access works.
    ///
    /// Returns the number of probes made. Permission and transient failures
    /// keep the poll going; any other failure is returned.
    pub async fn wait_until_effective<D>(
        &self,
        directory: &D,
        settings: &ElevationSettings,
    ) -> Result<usize>
    where
        D: IdentityDirectory + ?Sized,
    {
        let started = Instant::now();
        let mut probes = 0;

        loop {
            probes += 1;
            match directory.probe_access(&self.username).await {
                Ok(()) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    debug!(probes, elapsed_ms, "elevation effective");
                    return Ok(probes);
                }
                Err(err) if err.is_permission_denied() || err.is_transient() => {
                    if started.elapsed() >= settings.propagation_timeout {
                        warn!(
                            probes,
                            error = %err,
                            fallback_secs = settings.fallback_delay.as_secs(),
                            "elevation not confirmed before timeout, falling back to fixed delay"
                        );
                        sleep(settings.fallback_delay).await;
                        return Ok(probes);
                    }
                    sleep(settings.poll_interval).await;
                }
                Err(err) => {
                    return Err(err).context("Failed to confirm elevated access");
                }
            }
        }
    }

    /// Detach the policy if this session attached it.
    pub async fn release<A>(self, admin: &A) -> Result<()>
    where
        A: PolicyAdmin + ?Sized,
    {
        if !self.owned {
            return Ok(());
        }

        admin
            .detach_user_policy(&self.username, &self.policy_arn)
            .await
            .with_context(|| format!("Failed to detach {} from {}", self.policy_arn, self.username))?;
        info!(user = %self.username, policy = %self.policy_arn, "detached temporary policy");
        Ok(())
    }
}

/// Run `work` while elevated.
///
/// The policy is released whether `work` succeeds or fails. When both the
/// work and the release fail, the work's error is returned and the release
/// failure is logged.
pub async fn with_elevation<A, D, T, F>(
    admin: &A,
    directory: &D,
    settings: &ElevationSettings,
    work: F,
) -> Result<T>
where
    A: PolicyAdmin + ?Sized,
    D: IdentityDirectory + ?Sized,
    F: Future<Output = Result<T>>,
{
    let session = ElevatedSession::acquire(admin, settings).await?;
    debug!(
        user = %settings.username,
        owned = session.owns_attachment(),
        "elevation acquired"
    );

    let outcome = match session.wait_until_effective(directory, settings).await {
        Ok(_) => work.await,
        Err(err) => Err(err),
    };

    match (outcome, session.release(admin).await) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release_err)) => Err(release_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(release_err)) => {
            let detail = format!("{:#}", release_err);
            error!(error = %detail, "policy could not be detached, remove it manually");
            Err(err)
        }
    }
}
