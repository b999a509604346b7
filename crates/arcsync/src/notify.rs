//! Boundary to the notification/reporting sender.
//!
//! The engine reports terminal states here; mail or dashboard delivery is
//! an external concern.

use log::{error, info};

use crate::db::StatusInfo;

pub trait Notifier: Send + Sync {
    fn completed(&self, status: &StatusInfo);
    fn failed(&self, status: &StatusInfo);
}

/// Default notifier: logs terminal states.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn completed(&self, status: &StatusInfo) {
        info!(
            "Completed sync of {} (doc: {}, run: {})",
            status.original_file_path, status.doc, status.run_id
        );
    }

    fn failed(&self, status: &StatusInfo) {
        error!(
            "Sync failed for {} (doc: {}, retries: {}): {}",
            status.original_file_path,
            status.doc,
            status.retry_count,
            status.error_message.as_deref().unwrap_or("unknown error")
        );
    }
}
