//! Access-key report pipeline.
//!
//! - [`enumerator`] - per-user tag and key collection
//! - [`evaluator`] - key age and usage classification
//! - [`sink`] - CSV rows and report file naming
//! - [`pipeline`] - the account-wide loop tying them together

pub mod enumerator;
pub mod evaluator;
pub mod pipeline;
pub mod sink;

pub use enumerator::UserAudit;
pub use evaluator::{AccessKeyRecord, UsageInfo};
pub use pipeline::{write_report, ReportContext, ReportSummary};
pub use sink::{report_file_name, ReportWriter};
