//! Run configuration.
//!
//! Each setting comes from its command-line option when given, otherwise
//! from an environment variable where one exists, otherwise a default.
//! AWS credentials and region are not handled here; the SDK resolves them
//! from its usual environment and profile chain.

use crate::elevation::{ElevationSettings, ADMINISTRATOR_ACCESS_ARN, DEFAULT_ELEVATION_USER};
use crate::retry::RetryPolicy;
use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the identity to elevate.
pub const ELEVATION_USER_ENV: &str = "IAM_AUDIT_ELEVATION_USER";

/// Environment variable naming the policy to attach.
pub const POLICY_ARN_ENV: &str = "IAM_AUDIT_POLICY_ARN";

/// Options as they arrive from the command line.
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub elevation_user: Option<String>,
    pub policy_arn: Option<String>,
    pub no_elevation: bool,
    pub output_dir: Option<PathBuf>,
    pub propagation_timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
}

/// Resolved settings for one report run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    /// `None` when elevation is disabled
    pub elevation: Option<ElevationSettings>,
    pub output_dir: PathBuf,
    pub retry: RetryPolicy,
}

/// Pick the flag value, then the environment value, then the default.
pub fn resolve_setting(flag: Option<&str>, env_value: Option<String>, default: &str) -> String {
    flag.map(str::to_string)
        .or_else(|| env_value.filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| default.to_string())
}

impl AuditConfig {
    /// Resolve options against the process environment.
    pub fn from_options(options: &ReportOptions) -> Result<Self> {
        Self::resolve(options, |name| env::var(name).ok())
    }

    /// Resolve options with a custom environment lookup.
    pub fn resolve<F>(options: &ReportOptions, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let elevation = if options.no_elevation {
            None
        } else {
            let username = resolve_setting(
                options.elevation_user.as_deref(),
                lookup(ELEVATION_USER_ENV),
                DEFAULT_ELEVATION_USER,
            );
            let policy_arn = resolve_setting(
                options.policy_arn.as_deref(),
                lookup(POLICY_ARN_ENV),
                ADMINISTRATOR_ACCESS_ARN,
            );
            if username.trim().is_empty() {
                bail!("Elevation user must not be empty");
            }
            if !policy_arn.starts_with("arn:") {
                bail!("Invalid policy ARN '{}'", policy_arn);
            }

            let mut settings = ElevationSettings {
                username,
                policy_arn,
                ..ElevationSettings::default()
            };
            if let Some(secs) = options.propagation_timeout_secs {
                settings.propagation_timeout = Duration::from_secs(secs);
            }
            Some(settings)
        };

        let mut retry = RetryPolicy::default();
        if let Some(attempts) = options.max_attempts {
            if attempts == 0 {
                bail!("--max-attempts must be at least 1");
            }
            retry.max_attempts = attempts;
        }

        Ok(Self {
            elevation,
            output_dir: options
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
            retry,
        })
    }
}
