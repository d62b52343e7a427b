//! Progress bars for the long-running stages (seeds walked, users collected,
//! rows classified).

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const COUNT_TEMPLATE: &str = "{spinner:.green} {msg} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
     it/s: {per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}";

fn count_style() -> ProgressStyle {
    ProgressStyle::with_template(COUNT_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
}

/// Thin wrapper around an `indicatif` count bar.
/// - `inc_items(delta)` advances the bar
/// - `finish(msg)` finalizes it with a message
pub struct ProgressScope {
    pb: ProgressBar,
}

impl ProgressScope {
    pub fn count<T: Into<String>>(label: T, total: u64) -> Self {
        let pb = ProgressBar::new(total);
        pb.set_style(count_style());
        pb.enable_steady_tick(Duration::from_millis(100));
        let label = label.into();
        if !label.is_empty() {
            pb.set_message(label);
        }
        Self { pb }
    }

    /// A scope that draws nothing; used when progress output is switched off.
    pub fn hidden() -> Self {
        Self { pb: ProgressBar::hidden() }
    }

    /// `count` when `enabled`, otherwise `hidden`.
    pub fn maybe<T: Into<String>>(enabled: bool, label: T, total: u64) -> Self {
        if enabled { Self::count(label, total) } else { Self::hidden() }
    }

    #[inline]
    pub fn inc_items(&self, delta: u64) {
        self.pb.inc(delta);
    }

    pub fn finish<T: Into<String>>(&self, msg: T) {
        self.pb.finish_with_message(msg.into());
    }
}
