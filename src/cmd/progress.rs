//! Spinners for the network steps of a command
//!
//! Spinners draw on stderr so they never end up in redirected report output.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner for a request of unknown duration
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

pub fn finish_spinner_success(spinner: &ProgressBar, message: &str) {
    finish_with(spinner, "{prefix:.green} {msg}", "✓", message);
}

pub fn finish_spinner_error(spinner: &ProgressBar, message: &str) {
    finish_with(spinner, "{prefix:.red} {msg}", "✗", message);
}

/// Remove the spinner line entirely, for steps that print their own result
pub fn clear_spinner(spinner: &ProgressBar) {
    spinner.finish_and_clear();
}

fn finish_with(spinner: &ProgressBar, template: &str, prefix: &'static str, message: &str) {
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_prefix(prefix);
    spinner.finish_with_message(message.to_string());
}
