//! Progress output using indicatif
//!
//! A spinner on stderr counts scanned users while each completed username is
//! printed to stdout, so the list survives when output is piped.

use indicatif::{ProgressBar, ProgressStyle};

/// Receives per-user progress from the report pipeline
pub trait ReportProgress {
    /// Called once per user after that user's rows (if any) are written
    fn user_completed(&self, username: &str);
}

/// Spinner that tracks how many users have been scanned
pub struct ScanProgress {
    bar: ProgressBar,
}

impl ScanProgress {
    /// Create a new spinner with a label
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{msg} {spinner} {pos} users ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(label.to_string());

        Self { bar }
    }

    /// Finish with custom message
    pub fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Stop the spinner where it is, leaving the message in place
    pub fn abandon_with_message(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }

    #[cfg(test)]
    pub(crate) fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl ReportProgress for ScanProgress {
    fn user_completed(&self, username: &str) {
        self.bar.suspend(|| println!("{}", username));
        self.bar.inc(1);
    }
}
