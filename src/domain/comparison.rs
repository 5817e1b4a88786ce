//! Image comparison: tag-set similarity scoring plus a difference summary.
//!
//! Pure and synchronous. Operates on fully materialized analysis results;
//! safe to call concurrently.

use crate::domain::entities::{ComparisonOutcome, ImageAnalysis};
use std::collections::HashSet;

/// Distinct tag names in first-seen order.
///
/// Plain set iteration order is unspecified, so unique-tag listings are
/// built from the sequence as the vision service returned it. Duplicates
/// collapse on the first occurrence; membership is by exact name.
fn tag_names(analysis: &ImageAnalysis) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(analysis.tags.len());
    for tag in &analysis.tags {
        if seen.insert(tag.name.as_str()) {
            names.push(tag.name.as_str());
        }
    }
    names
}

/// Compare two analysis results.
///
/// Similarity is the Jaccard index over distinct tag names, as a percentage.
/// Confidence values do not participate. An empty union scores 0.0 instead
/// of dividing by zero.
///
/// The summary opens with a same/different verdict, lists one statement per
/// differing axis (description first, then tags unique to each image), and
/// always closes with the percentage at two decimals. Description and tags
/// are independent signals: identical tag sets with differing descriptions
/// still read as "different" at 100.00% similarity.
pub fn compare(a: &ImageAnalysis, b: &ImageAnalysis) -> ComparisonOutcome {
    let names_a = tag_names(a);
    let names_b = tag_names(b);
    let set_a: HashSet<&str> = names_a.iter().copied().collect();
    let set_b: HashSet<&str> = names_b.iter().copied().collect();

    let common = set_a.intersection(&set_b).count();
    let total = set_a.union(&set_b).count();
    let similarity = if total == 0 {
        0.0
    } else {
        common as f64 / total as f64 * 100.0
    };

    let mut differences = Vec::new();

    if a.description != b.description {
        differences.push(format!(
            "The descriptions are different: '{}' vs '{}'.",
            a.description, b.description
        ));
    }

    let unique_a: Vec<&str> = names_a
        .iter()
        .copied()
        .filter(|name| !set_b.contains(name))
        .collect();
    let unique_b: Vec<&str> = names_b
        .iter()
        .copied()
        .filter(|name| !set_a.contains(name))
        .collect();

    if !unique_a.is_empty() {
        differences.push(format!("Image 1 has unique tags: {}.", unique_a.join(", ")));
    }
    if !unique_b.is_empty() {
        differences.push(format!("Image 2 has unique tags: {}.", unique_b.join(", ")));
    }

    let mut summary = if differences.is_empty() {
        "The images are the same.".to_string()
    } else {
        format!("The images are different. {}", differences.join(" "))
    };
    summary.push_str(&format!(
        " The images are {:.2}% similar based on tags.",
        similarity
    ));

    ComparisonOutcome {
        similarity,
        summary,
    }
}
