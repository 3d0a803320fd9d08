//! Terminal progress display for builds.

use forge_engine::ProgressSink;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner for stage/component status, with markdown printed above it.
pub struct BuildProgress {
    multi: MultiProgress,
    status: ProgressBar,
}

impl Default for BuildProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildProgress {
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.green} [{elapsed}] {msg}")
                .expect("valid template"),
        );
        status.enable_steady_tick(Duration::from_millis(120));

        Self { multi, status }
    }

    /// Finish the spinner, leaving no trace.
    pub fn finish(&self) {
        self.status.finish_and_clear();
    }

    /// Suspend the spinner for clean eprintln output, then resume.
    pub fn suspend<F: FnOnce()>(&self, f: F) {
        self.multi.suspend(f);
    }
}

impl ProgressSink for BuildProgress {
    fn progress(&self, text: &str) {
        self.status.set_message(text.to_string());
    }

    fn markdown(&self, text: &str) {
        self.multi.suspend(|| eprintln!("\n{}\n", text.trim_end()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_updates_message() {
        let progress = BuildProgress::new();
        progress.progress("Stage: Initialize");
        assert_eq!(progress.status.message(), "Stage: Initialize");
        progress.finish();
        assert!(progress.status.is_finished());
    }
}
