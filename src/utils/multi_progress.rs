use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

pub trait MultiProgressNew {
    /// Adds a spinner-driven bar that redraws itself while requests are in
    /// flight.
    fn add_with_style(&self, pb: ProgressBar, style: ProgressStyle) -> ProgressBar;

    fn add_message(&self, message: impl Into<String>) -> ProgressBar;
}

impl MultiProgressNew for MultiProgress {
    fn add_with_style(&self, pb: ProgressBar, style: ProgressStyle) -> ProgressBar {
        let pb = self.add(pb);
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    fn add_message(&self, message: impl Into<String>) -> ProgressBar {
        let pb = self.add_with_style(
            ProgressBar::new_spinner(),
            super::ProgressStyleTemplate::only_message(),
        );
        pb.set_message(message.into());
        pb
    }
}
