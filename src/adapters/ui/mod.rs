pub mod banner;
pub mod progress;
pub mod tui;

/// Prints the welcome banner and applies the neon theme for all subsequent
/// inquire prompts. Call once at startup, right after tracing init.
pub fn init_ui() {
    banner::print_welcome();
    tui::apply_theme();
}
