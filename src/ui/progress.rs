use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner on stderr while a long CLI operation runs. Hidden when stderr is
/// not a terminal.
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = if console::Term::stderr().is_term() {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} {elapsed:.dim}") {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };
        pb.set_message(message.to_string());
        Self { pb }
    }

    /// Remove the spinner line
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}
