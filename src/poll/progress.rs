//! Progress sinks advanced by the poller while it waits.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Receives one tick for every unsatisfied state check.
pub trait ProgressSink {
    /// Advances the indicator by one step.
    fn tick(&mut self);
}

/// Sink that discards ticks.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn tick(&mut self) {}
}

impl ProgressSink for ProgressBar {
    fn tick(&mut self) {
        self.inc(1);
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for &mut S {
    fn tick(&mut self) {
        (**self).tick();
    }
}

/// Spinner for indeterminate waits; its position counts completed checks.
#[must_use]
pub fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg} ({pos} checks)")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    bar.set_style(style);
    bar.set_message(message.to_owned());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Hidden bar used when stderr is not interactive.
#[must_use]
pub fn hidden() -> ProgressBar {
    ProgressBar::hidden()
}
