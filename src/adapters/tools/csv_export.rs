//! CSV export of the analysis history. Uses the `csv` crate for safe
//! serialization.
//!
//! Produces a semicolon-delimited file, one row per analyzed image.

use crate::domain::{AnalysisRecord, DomainError, Tag};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::info;

/// Convert an analysis history to a CSV string.
///
/// Format: `Analyzed;File;Description;Tags` (semicolon-delimited). Tags are
/// rendered as `name (confidence)` pairs joined by commas.
pub fn history_to_csv(history: &[AnalysisRecord]) -> Result<String, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_writer(Vec::new());

    // Write header
    wtr.write_record(["Analyzed", "File", "Description", "Tags"])?;

    for record in history {
        // Convert Unix timestamp to readable ISO format
        let date_str = DateTime::<Utc>::from_timestamp(record.analyzed_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| record.analyzed_at.to_string());

        // Clean text: the csv crate handles quoting, but embedded newlines
        // make the file hard to eyeball
        let clean_description = record
            .analysis
            .description
            .replace('\n', " ")
            .replace('\r', "");

        let tags_str = format_tags(&record.analysis.tags);

        wtr.write_record([
            &date_str,
            &record.filename,
            &clean_description,
            &tags_str,
        ])?;
    }

    wtr.flush()?;
    let bytes = wtr.into_inner().map_err(|e| {
        csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::Other,
            e.to_string(),
        ))
    })?;

    String::from_utf8(bytes).map_err(|e| {
        csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        ))
    })
}

/// Render the history to a CSV file on disk.
pub async fn write_history(path: &Path, history: &[AnalysisRecord]) -> Result<(), DomainError> {
    let csv = history_to_csv(history)
        .map_err(|e| DomainError::Report(format!("CSV serialization failed: {}", e)))?;

    tokio::fs::write(path, csv)
        .await
        .map_err(|e| DomainError::Report(format!("write CSV: {}", e)))?;

    info!(path = %path.display(), rows = history.len(), "history exported");
    Ok(())
}

fn format_tags(tags: &[Tag]) -> String {
    tags.iter()
        .map(|t| format!("{} ({:.2})", t.name, t.confidence))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImageAnalysis;

    fn record(filename: &str, description: &str, tags: Vec<Tag>) -> AnalysisRecord {
        AnalysisRecord {
            image_id: 1,
            user_id: 7,
            filename: filename.to_string(),
            analysis: ImageAnalysis {
                description: description.to_string(),
                tags,
                categories: Vec::new(),
                objects: Vec::new(),
            },
            analyzed_at: 1704067200, // 2024-01-01 00:00:00 UTC
        }
    }

    #[test]
    fn test_history_to_csv_basic() {
        let history = vec![record(
            "cat.jpg",
            "a cat sitting on a sofa",
            vec![Tag::new("cat", 0.99), Tag::new("animal", 0.97)],
        )];

        let csv = history_to_csv(&history).unwrap();
        assert!(csv.starts_with("Analyzed;File;Description;Tags"));
        assert!(csv.contains("2024-01-01"));
        assert!(csv.contains("cat.jpg"));
        assert!(csv.contains("cat (0.99), animal (0.97)"));
    }

    #[test]
    fn test_history_to_csv_special_chars() {
        let history = vec![record(
            "odd;name.png",
            "contains; semicolons and \"quotes\"\nand a newline",
            vec![Tag::new("test", 0.5)],
        )];

        let csv = history_to_csv(&history).unwrap();
        // Fields with the delimiter must come back quoted
        assert!(csv.contains("\"odd;name.png\""));
        // Newlines in the description are flattened: header + 1 data row
        assert_eq!(csv.trim_end().lines().count(), 2);
    }

    #[test]
    fn test_empty_history_is_just_the_header() {
        let csv = history_to_csv(&[]).unwrap();
        assert_eq!(csv.trim_end(), "Analyzed;File;Description;Tags");
    }
}
