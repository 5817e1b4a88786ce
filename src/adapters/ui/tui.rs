//! Implements InputPort. Inquire-based interactive prompts.
//!
//! Auth menu first (log in / register), then the library menu. Esc cancels
//! the current action and falls back to the menu; action errors are printed
//! rather than propagated, so one failed call never ends the session.

use crate::adapters::tools::csv_export;
use crate::adapters::ui::progress;
use crate::domain::{AnalysisRecord, ComparisonOutcome, DomainError, ImageSummary, Tag, User};
use crate::ports::InputPort;
use crate::usecases::{AnalysisService, AuthService, ComparisonService, LibraryService};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inquire::ui::{Attributes, Color, RenderConfig, StyleSheet, Styled};
use inquire::{InquireError, Password, PasswordDisplayMode, Select, Text};
use std::path::Path;
use std::sync::Arc;

const AUTH_LOGIN: &str = "Log in";
const AUTH_REGISTER: &str = "Register";

const MENU_LIBRARY: &str = "My library";
const MENU_UPLOAD: &str = "Upload image";
const MENU_ANALYZE: &str = "Analyze image";
const MENU_ANALYZE_ALL: &str = "Analyze whole library";
const MENU_COMPARE: &str = "Compare two images";
const MENU_EXPORT: &str = "Export analysis history (CSV)";
const MENU_LOGOUT: &str = "Log out";
const MENU_QUIT: &str = "Quit";

/// Applies the neon theme to all subsequent inquire prompts.
pub fn apply_theme() {
    let neon_blue = Color::Rgb {
        r: 0x13,
        g: 0x8c,
        b: 0xfe,
    };
    let cyber_green = Color::Rgb {
        r: 0x0f,
        g: 0xf0,
        b: 0xfc,
    };

    let mut config = RenderConfig::default_colored();
    config.prompt_prefix = Styled::new("»").with_fg(neon_blue);
    config.answered_prompt_prefix = Styled::new("✔").with_fg(cyber_green);
    config.highlighted_option_prefix = Styled::new("➤").with_fg(cyber_green);
    config.selected_option = Some(StyleSheet::new().with_fg(cyber_green));
    config.answer = StyleSheet::new()
        .with_attr(Attributes::BOLD)
        .with_fg(cyber_green);
    inquire::set_global_render_config(config);
}

/// How a main-menu session ends.
enum MenuExit {
    LogOut,
    Quit,
}

/// TUI adapter. Inquire prompts over the application services.
pub struct TuiInputPort {
    auth: Arc<AuthService>,
    library: Arc<LibraryService>,
    analysis: Arc<AnalysisService>,
    comparison: Arc<ComparisonService>,
}

impl TuiInputPort {
    pub fn new(
        auth: Arc<AuthService>,
        library: Arc<LibraryService>,
        analysis: Arc<AnalysisService>,
        comparison: Arc<ComparisonService>,
    ) -> Self {
        Self {
            auth,
            library,
            analysis,
            comparison,
        }
    }

    async fn login_prompt(&self) -> Result<Option<User>, DomainError> {
        let Some(username) = optional(Text::new("Username:").prompt())? else {
            return Ok(None);
        };
        let Some(password) = optional(
            Password::new("Password:")
                .with_display_mode(PasswordDisplayMode::Masked)
                .without_confirmation()
                .prompt(),
        )?
        else {
            return Ok(None);
        };
        Ok(Some(self.auth.login(&username, &password).await?))
    }

    async fn register_prompt(&self) -> Result<Option<User>, DomainError> {
        let Some(username) = optional(Text::new("Choose a username:").prompt())? else {
            return Ok(None);
        };
        let Some(password) = optional(
            Password::new("Choose a password:")
                .with_display_mode(PasswordDisplayMode::Masked)
                .with_custom_confirmation_message("Confirm password:")
                .with_custom_confirmation_error_message("The passwords don't match.")
                .prompt(),
        )?
        else {
            return Ok(None);
        };
        Ok(Some(self.auth.register(&username, &password).await?))
    }

    async fn main_menu(&self, user: &User) -> Result<MenuExit, DomainError> {
        loop {
            let options = vec![
                MENU_LIBRARY,
                MENU_UPLOAD,
                MENU_ANALYZE,
                MENU_ANALYZE_ALL,
                MENU_COMPARE,
                MENU_EXPORT,
                MENU_LOGOUT,
                MENU_QUIT,
            ];
            let prompt = Select::new(&format!("Main menu ({})", user.username), options).prompt();
            let Some(choice) = optional(prompt)? else {
                continue; // Esc on the menu itself stays on the menu
            };

            let result = match choice {
                MENU_LIBRARY => self.show_library(user.id).await,
                MENU_UPLOAD => self.upload_image(user.id).await,
                MENU_ANALYZE => self.analyze_one(user.id).await,
                MENU_ANALYZE_ALL => self.analyze_all(user.id).await,
                MENU_COMPARE => self.compare_two(user.id).await,
                MENU_EXPORT => self.export_history(user.id).await,
                MENU_LOGOUT => {
                    self.auth.logout().await?;
                    println!("Logged out.");
                    return Ok(MenuExit::LogOut);
                }
                _ => return Ok(MenuExit::Quit),
            };

            // One failed action never ends the session.
            if let Err(e) = result {
                println!("✘ {}", e);
            }
        }
    }

    async fn show_library(&self, user_id: i64) -> Result<(), DomainError> {
        let images = self.library.list(user_id).await?;
        if images.is_empty() {
            println!("The library is empty. Upload an image first.");
            return Ok(());
        }
        println!("{} image(s):", images.len());
        for image in &images {
            println!("  {}", format_image_line(image));
        }
        Ok(())
    }

    async fn upload_image(&self, user_id: i64) -> Result<(), DomainError> {
        let Some(path) = optional(Text::new("Path to the image file:").prompt())? else {
            return Ok(());
        };
        let record = self.library.upload(user_id, Path::new(path.trim())).await?;
        println!(
            "✔ Saved {} ({}).",
            record.filename,
            format_size(record.byte_len)
        );
        Ok(())
    }

    async fn analyze_one(&self, user_id: i64) -> Result<(), DomainError> {
        let Some(image) = self
            .select_image(user_id, "Which image should be analyzed?")
            .await?
        else {
            return Ok(());
        };

        let pb = progress::spinner("Analyzing image...");
        let result = self.analysis.ensure_analysis(user_id, image.id).await;
        pb.finish_and_clear();

        let record = result?;
        render_analysis(&record);
        println!("Report: {}", self.analysis.report_path(image.id).display());
        Ok(())
    }

    async fn analyze_all(&self, user_id: i64) -> Result<(), DomainError> {
        let pb = progress::spinner("Analyzing library...");
        let result = self.analysis.analyze_library(user_id).await;
        pb.finish_and_clear();

        let reports = result?;
        if reports.is_empty() {
            println!("Nothing new to analyze.");
        } else {
            println!("✔ {} new report(s):", reports.len());
            for path in &reports {
                println!("  {}", path.display());
            }
        }
        Ok(())
    }

    async fn compare_two(&self, user_id: i64) -> Result<(), DomainError> {
        let Some(first) = self.select_image(user_id, "First image:").await? else {
            return Ok(());
        };
        let Some(second) = self.select_image(user_id, "Second image:").await? else {
            return Ok(());
        };

        let pb = progress::spinner("Comparing images...");
        let result = self
            .comparison
            .compare_images(user_id, first.id, second.id)
            .await;
        pb.finish_and_clear();

        render_comparison(&first, &second, &result?);
        Ok(())
    }

    async fn export_history(&self, user_id: i64) -> Result<(), DomainError> {
        let history = self.analysis.history(user_id).await?;
        if history.is_empty() {
            println!("No analyses yet. Analyze an image first.");
            return Ok(());
        }
        let Some(path) = optional(
            Text::new("Export to:")
                .with_default("analysis_history.csv")
                .prompt(),
        )?
        else {
            return Ok(());
        };
        let path = path.trim().to_string();
        csv_export::write_history(Path::new(&path), &history).await?;
        println!("✔ Exported {} record(s) to {}.", history.len(), path);
        Ok(())
    }

    /// Pick one library image. None when the library is empty or the user
    /// pressed Esc.
    async fn select_image(
        &self,
        user_id: i64,
        message: &str,
    ) -> Result<Option<ImageSummary>, DomainError> {
        let images = self.library.list(user_id).await?;
        if images.is_empty() {
            println!("The library is empty. Upload an image first.");
            return Ok(None);
        }
        let options: Vec<String> = images.iter().map(format_image_line).collect();
        let Some(choice) = optional(Select::new(message, options).raw_prompt())? else {
            return Ok(None);
        };
        Ok(Some(images[choice.index].clone()))
    }
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        if let Some(user) = self.auth.restore_session().await? {
            println!("Welcome back, {}.", user.username);
            if let MenuExit::Quit = self.main_menu(&user).await? {
                return Ok(());
            }
        }

        loop {
            let prompt = Select::new(
                "What would you like to do?",
                vec![AUTH_LOGIN, AUTH_REGISTER, MENU_QUIT],
            )
            .prompt();
            let Some(choice) = optional(prompt)? else {
                return Ok(()); // Esc at the top level quits
            };

            let user = match choice {
                AUTH_LOGIN => self.login_prompt().await,
                AUTH_REGISTER => self.register_prompt().await,
                _ => return Ok(()),
            };

            match user {
                Ok(Some(user)) => {
                    println!("Welcome, {}.", user.username);
                    if let MenuExit::Quit = self.main_menu(&user).await? {
                        return Ok(());
                    }
                }
                Ok(None) => {} // canceled mid-prompt
                Err(e) => println!("✘ {}", e),
            }
        }
    }
}

/// Esc cancels the current action; everything else is a prompt error.
fn optional<T>(result: Result<T, InquireError>) -> Result<Option<T>, DomainError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled) => Ok(None),
        Err(e) => Err(DomainError::Prompt(e.to_string())),
    }
}

fn format_image_line(image: &ImageSummary) -> String {
    format!(
        "{} ({}, {})",
        image.filename,
        format_size(image.byte_len),
        format_timestamp(image.uploaded_at)
    )
}

fn format_size(bytes: i64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

fn format_timestamp(unix: i64) -> String {
    DateTime::<Utc>::from_timestamp(unix, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| unix.to_string())
}

fn join_tags(tags: &[Tag]) -> String {
    tags.iter()
        .map(|t| format!("{} ({:.2})", t.name, t.confidence))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_analysis(record: &AnalysisRecord) {
    println!();
    println!(
        "{} (analyzed {})",
        record.filename,
        format_timestamp(record.analyzed_at)
    );
    if record.analysis.description.is_empty() {
        println!("  No caption.");
    } else {
        println!("  {}", record.analysis.description);
    }
    if !record.analysis.tags.is_empty() {
        println!("  Tags: {}", join_tags(&record.analysis.tags));
    }
    if !record.analysis.categories.is_empty() {
        println!("  Categories: {}", join_tags(&record.analysis.categories));
    }
    if !record.analysis.objects.is_empty() {
        println!("  Objects: {}", join_tags(&record.analysis.objects));
    }
    println!();
}

fn render_comparison(first: &ImageSummary, second: &ImageSummary, outcome: &ComparisonOutcome) {
    println!();
    println!("{} vs {}", first.filename, second.filename);
    println!("{}", outcome.summary);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_buckets() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_timestamp() {
        // 2024-01-01 00:00:00 UTC
        assert_eq!(format_timestamp(1704067200), "2024-01-01 00:00");
    }

    #[test]
    fn test_join_tags_renders_confidence() {
        let tags = vec![Tag::new("cat", 0.99), Tag::new("animal", 0.5)];
        assert_eq!(join_tags(&tags), "cat (0.99), animal (0.50)");
    }

    #[test]
    fn test_image_line_shows_name_size_and_date() {
        let line = format_image_line(&ImageSummary {
            id: 1,
            user_id: 7,
            filename: "cat.jpg".to_string(),
            byte_len: 2048,
            uploaded_at: 1704067200,
        });
        assert_eq!(line, "cat.jpg (2.0 KB, 2024-01-01 00:00)");
    }
}
