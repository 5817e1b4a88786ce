//! Compare two library images by their vision analyses.
//!
//! Materializes both analyses (concurrently; the analysis log makes repeat
//! comparisons cheap) and hands them to the similarity engine. The outcome
//! is returned to the caller and never persisted.

use crate::domain::{comparison, ComparisonOutcome, DomainError};
use crate::usecases::AnalysisService;
use std::sync::Arc;
use tracing::info;

pub struct ComparisonService {
    analysis: Arc<AnalysisService>,
}

impl ComparisonService {
    pub fn new(analysis: Arc<AnalysisService>) -> Self {
        Self { analysis }
    }

    /// Compare two of the user's images.
    ///
    /// Argument order decides which image the summary calls "Image 1".
    /// Comparing an image with itself is permitted, trivially reads as
    /// "the same", and analyzes the image only once.
    pub async fn compare_images(
        &self,
        user_id: i64,
        first_id: i64,
        second_id: i64,
    ) -> Result<ComparisonOutcome, DomainError> {
        let (first, second) = if first_id == second_id {
            // Concurrent misses for the same id would each call the vision
            // API before either result lands in the log.
            let record = self.analysis.ensure_analysis(user_id, first_id).await?;
            (record.clone(), record)
        } else {
            tokio::try_join!(
                self.analysis.ensure_analysis(user_id, first_id),
                self.analysis.ensure_analysis(user_id, second_id),
            )?
        };

        let outcome = comparison::compare(&first.analysis, &second.analysis);
        info!(
            user_id,
            first_id,
            second_id,
            similarity = format!("{:.2}", outcome.similarity),
            "images compared"
        );
        Ok(outcome)
    }
}
