//! Utility functions and helpers.
//!
//! - [`progress`] - Progress display for the user scan
//! - [`time`] - Day arithmetic and timestamp helpers
//!
//! # Examples
//!
//! ```
//! use iam_key_audit::utils::time::{parse_timestamp, whole_days_between};
//!
//! let created = parse_timestamp("2025-10-01T08:00:00Z").unwrap();
//! let now = parse_timestamp("2025-10-11T07:59:59Z").unwrap();
//! assert_eq!(whole_days_between(&created, &now), 9);
//! ```

pub mod progress;
pub mod time;
