//! Spinner for long-running calls (vision analysis, library sweeps).

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Start a ticking spinner with the given message. Call `finish_and_clear`
/// when the work is done so the line disappears before output is printed.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
