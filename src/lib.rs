//! # IAM Key Audit
//!
//! Command-line tool that audits the access keys of every IAM user in an AWS
//! account and writes the result as a CSV report.
//!
//! ## Overview
//!
//! For each user the report carries the user's contact tags and, per access
//! key, its status, its age in whole days, and how long ago it was last used.
//! Long-lived keys that are old or unused stand out at a glance.
//!
//! To read every user, the tool attaches an administrative policy to its own
//! identity for the duration of the scan and detaches it afterwards, on
//! success and on failure alike.
//!
//! ## Architecture
//!
//! - [`iam`] - Directory traits, the AWS SDK implementation, and an in-memory one
//! - [`report`] - Key evaluation, per-user enumeration, CSV output, the scan loop
//! - [`elevation`] - Scoped policy attachment with a propagation wait
//! - [`retry`] - Backoff for throttled or unavailable directory calls
//! - [`config`] - Option, environment and default resolution
//! - [`commands`] - The report command
//! - [`utils`] - Progress output and time helpers
//!
//! ## Example Usage
//!
//! ```bash
//! # Writes ProdEast_10172025.csv in the current directory
//! iam-key-report "Prod East"
//!
//! # Without touching policies
//! iam-key-report staging --no-elevation --output-dir reports/
//! ```
//!
//! ## Failure handling
//!
//! A user whose tags or keys cannot be read is logged and skipped; the rest
//! of the account is still reported. Failing to list users, resolve the
//! account, write the file, or attach/detach the policy ends the run.

pub mod commands;
pub mod config;
pub mod elevation;
pub mod iam;
pub mod report;
pub mod retry;
pub mod utils;
