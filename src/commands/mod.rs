//! Command implementations.
//!
//! - [`key_report`] - audit every IAM user's access keys into a CSV report

pub mod key_report;
