// UI layer: everything the run prints. The upload progress bar uses
// `indicatif`; plain text (dry-run summary, release confirmations) goes
// to whatever writer the caller hands in so it can be captured in tests.

use crate::cli::PublishConfig;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};

const BAR_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})";

/// Tracks one file's upload and drives its progress bar. Updates carry
/// the cumulative byte count reported by the transfer; the bar only ever
/// moves forward and never past the file size.
pub struct UploadProgress {
    bar: ProgressBar,
    total: u64,
    position: u64,
}

impl UploadProgress {
    /// Visible bar on stderr for an upload of `total` bytes.
    pub fn new(total: u64, label: &str) -> Self {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_message(label.to_string());
        Self::with_bar(total, bar)
    }

    /// Bar that tracks state without drawing anything.
    pub fn hidden(total: u64) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden());
        Self::with_bar(total, bar)
    }

    fn with_bar(total: u64, bar: ProgressBar) -> Self {
        UploadProgress {
            bar,
            total,
            position: 0,
        }
    }

    /// Handle to the underlying bar; clones share state.
    pub fn bar(&self) -> ProgressBar {
        self.bar.clone()
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Apply a cumulative byte count and return how far the bar moved.
    /// Counts that would move backward or overshoot the total are ignored.
    pub fn record(&mut self, cumulative: u64) -> u64 {
        let Some(delta) = cumulative.checked_sub(self.position) else {
            tracing::warn!(cumulative, position = self.position, "ignoring stale progress");
            return 0;
        };
        if delta > self.total - self.position {
            tracing::warn!(cumulative, total = self.total, "ignoring progress past total");
            return 0;
        }
        self.position += delta;
        self.bar.inc(delta);
        delta
    }
}

/// Force a bar to 100% once its upload call has returned.
pub fn finish_upload(bar: &ProgressBar) {
    if let Some(len) = bar.length() {
        bar.set_position(len);
    }
    bar.finish();
}

/// Print the resolved configuration for `--test` runs.
pub fn print_dry_run<W: Write>(out: &mut W, config: &PublishConfig) -> io::Result<()> {
    writeln!(out, "User: {}", config.username)?;
    writeln!(out, "Version: {}", config.version)?;
    writeln!(out, "Description: {}", config.description)?;
    writeln!(out, "Files: {}", config.directory.display())?;
    writeln!(out, "Boxes: {}", config.boxes.join(", "))?;
    writeln!(out, "Provider: {}", config.provider)?;
    for name in &config.boxes {
        writeln!(
            out,
            "Would upload version {} of {} for {} from {}",
            config.version,
            config.box_tag(name),
            config.provider,
            config.box_path(name).display()
        )?;
    }
    Ok(())
}

/// Confirmation line emitted after each box is released.
pub fn print_released<W: Write>(out: &mut W, tag: &str, version: &str) -> io::Result<()> {
    writeln!(out, "Released {tag} v{version}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> PublishConfig {
        PublishConfig {
            username: "acme".into(),
            version: "2.0.1".into(),
            description: "Weekly image".into(),
            directory: PathBuf::from("/srv/boxes"),
            boxes: vec!["web".into(), "db".into()],
            provider: "virtualbox".into(),
        }
    }

    #[test]
    fn advances_by_reported_deltas() {
        let mut progress = UploadProgress::hidden(1000);
        let deltas: Vec<u64> = [200, 500, 1000].iter().map(|&c| progress.record(c)).collect();
        assert_eq!(deltas, vec![200, 300, 500]);
        assert_eq!(progress.position(), 1000);
        assert_eq!(progress.bar().position(), 1000);
    }

    #[test]
    fn ignores_backward_and_overshooting_updates() {
        let mut progress = UploadProgress::hidden(1000);
        progress.record(600);
        assert_eq!(progress.record(400), 0);
        assert_eq!(progress.record(1500), 0);
        assert_eq!(progress.position(), 600);
        assert_eq!(progress.bar().position(), 600);
        assert_eq!(progress.record(600), 0);
        assert_eq!(progress.record(700), 100);
    }

    #[test]
    fn finish_fills_bar_when_updates_fall_short() {
        let mut progress = UploadProgress::hidden(1000);
        progress.record(300);
        let bar = progress.bar();
        finish_upload(&bar);
        assert_eq!(bar.position(), 1000);
        assert!(bar.is_finished());
    }

    #[test]
    fn empty_file_finishes_cleanly() {
        let mut progress = UploadProgress::hidden(0);
        assert_eq!(progress.record(0), 0);
        finish_upload(&progress.bar());
        assert_eq!(progress.bar().position(), 0);
    }

    #[test]
    fn dry_run_prints_every_field() {
        let mut out = Vec::new();
        print_dry_run(&mut out, &config()).unwrap();
        let text = String::from_utf8(out).unwrap();
        for line in [
            "User: acme",
            "Version: 2.0.1",
            "Description: Weekly image",
            "Files: /srv/boxes",
            "Boxes: web, db",
            "Provider: virtualbox",
            "Would upload version 2.0.1 of acme/web for virtualbox from /srv/boxes/web-virtualbox.box",
            "Would upload version 2.0.1 of acme/db for virtualbox from /srv/boxes/db-virtualbox.box",
        ] {
            assert!(text.lines().any(|l| l == line), "missing {line:?} in:\n{text}");
        }
    }

    #[test]
    fn release_confirmation_names_box_and_version() {
        let mut out = Vec::new();
        print_released(&mut out, "acme/web", "2.0.1").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Released acme/web v2.0.1\n");
    }
}
