// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Progress reporting for byte transfers.

use indicatif::{ProgressBar, ProgressStyle};

/// Receives sampled byte progress.
pub trait ProgressSink {
    /// Total size became known (or changed).
    fn set_total(&mut self, total: u64);
    /// `delta` more bytes are done.
    fn advance(&mut self, delta: u64);
    fn finish(&mut self);
}

/// Builds one sink per transferred file, given its label.
pub type ProgressFactory = Box<dyn Fn(&str) -> Box<dyn ProgressSink>>;

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_total(&mut self, _total: u64) {}
    fn advance(&mut self, _delta: u64) {}
    fn finish(&mut self) {}
}

/// Terminal byte progress bar.
#[derive(Debug, Clone)]
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "  {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ETA {eta}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        bar.set_message(label.to_string());
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn set_total(&mut self, total: u64) {
        self.bar.set_length(total);
    }

    fn advance(&mut self, delta: u64) {
        self.bar.inc(delta);
    }

    fn finish(&mut self) {
        self.bar.finish();
    }
}

/// Factory producing [`BarProgress`] sinks.
pub fn bar_factory() -> ProgressFactory {
    Box::new(|label| Box::new(BarProgress::new(label)))
}

/// Factory producing [`NoProgress`] sinks.
pub fn silent_factory() -> ProgressFactory {
    Box::new(|_| Box::new(NoProgress))
}
