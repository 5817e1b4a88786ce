//! Analysis service. Orchestrates the vision analysis workflow.
//!
//! Coordinates between the library (image bytes), the vision adapter
//! (analysis), the analysis log (idempotency), and the filesystem (reports).

use crate::domain::{AnalysisRecord, DomainError, Tag};
use crate::ports::{AnalysisLogPort, VisionPort};
use crate::usecases::LibraryService;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::{debug, info};

/// Service for vision-powered image analysis.
///
/// Orchestrates the flow:
/// 1. Serve from the analysis log when the image was analyzed before
/// 2. Otherwise load and decode the stored bytes
/// 3. Send them to the vision service
/// 4. Persist the result and generate a Markdown report
pub struct AnalysisService {
    vision: Arc<dyn VisionPort>,
    library: Arc<LibraryService>,
    log: Arc<dyn AnalysisLogPort>,
    reports_dir: PathBuf,
}

impl AnalysisService {
    pub fn new(
        vision: Arc<dyn VisionPort>,
        library: Arc<LibraryService>,
        log: Arc<dyn AnalysisLogPort>,
        reports_dir: PathBuf,
    ) -> Self {
        Self {
            vision,
            library,
            log,
            reports_dir,
        }
    }

    /// Analyze one image, or return the logged result if it exists.
    ///
    /// A fresh analysis is persisted to the log and written out as a
    /// Markdown report before it is returned. A log hit recreates the
    /// report when the file is missing, so the report path stays valid.
    pub async fn ensure_analysis(
        &self,
        user_id: i64,
        image_id: i64,
    ) -> Result<AnalysisRecord, DomainError> {
        if let Some(record) = self.log.get_analysis(user_id, image_id).await? {
            debug!(user_id, image_id, "analysis served from log");
            // The file can be gone even though the log row exists (deleted,
            // or a report write that failed after the log insert).
            if !fs::try_exists(self.report_path(image_id)).await.unwrap_or(false) {
                self.generate_report(&record).await?;
            }
            return Ok(record);
        }

        let (image, bytes) = self.library.load_bytes(user_id, image_id).await?;
        info!(
            user_id,
            image_id,
            filename = %image.filename,
            bytes = bytes.len(),
            "sending image to vision analysis"
        );
        let analysis = self.vision.analyze(&bytes).await?;

        let analyzed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let record = AnalysisRecord {
            image_id,
            user_id,
            filename: image.filename,
            analysis,
            analyzed_at,
        };

        self.log.save_analysis(&record).await?;
        self.generate_report(&record).await?;

        info!(
            user_id,
            image_id,
            tags = record.analysis.tags.len(),
            "analysis complete"
        );
        Ok(record)
    }

    /// Analyze every library image that has no logged analysis yet.
    ///
    /// Runs sequentially to keep API usage predictable. Returns the paths of
    /// newly generated reports; already-analyzed images are skipped
    /// (idempotent).
    pub async fn analyze_library(&self, user_id: i64) -> Result<Vec<PathBuf>, DomainError> {
        let images = self.library.list(user_id).await?;
        if images.is_empty() {
            info!(user_id, "library is empty, nothing to analyze");
            return Ok(Vec::new());
        }

        let mut reports = Vec::new();
        for image in &images {
            if self.log.get_analysis(user_id, image.id).await?.is_some() {
                continue;
            }
            self.ensure_analysis(user_id, image.id).await?;
            reports.push(self.report_path(image.id));
        }

        info!(
            user_id,
            images = images.len(),
            reports_generated = reports.len(),
            "library analysis complete"
        );
        Ok(reports)
    }

    /// All of the user's analyses, newest first. Feeds the CSV export.
    pub async fn history(&self, user_id: i64) -> Result<Vec<AnalysisRecord>, DomainError> {
        self.log.get_history(user_id).await
    }

    /// Where the report for an image lands.
    pub fn report_path(&self, image_id: i64) -> PathBuf {
        self.reports_dir.join(format!("analysis_{}.md", image_id))
    }

    /// Generate a Markdown report from an analysis record.
    async fn generate_report(&self, record: &AnalysisRecord) -> Result<PathBuf, DomainError> {
        fs::create_dir_all(&self.reports_dir)
            .await
            .map_err(|e| DomainError::Report(format!("create reports dir: {}", e)))?;

        let path = self.report_path(record.image_id);
        let timestamp = DateTime::<Utc>::from_timestamp(record.analyzed_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let mut md = String::new();

        // Header
        md.push_str(&format!("# Image Analysis: {}\n\n", record.filename));
        md.push_str(&format!(
            "**Image ID:** {} | **Analyzed:** {}\n\n",
            record.image_id, timestamp
        ));
        md.push_str("---\n\n");

        // Description
        md.push_str("## 📝 Description\n\n");
        if record.analysis.description.is_empty() {
            md.push_str("_The vision service returned no caption._\n\n");
        } else {
            md.push_str(&record.analysis.description);
            md.push_str("\n\n");
        }

        push_tag_section(&mut md, "## 🏷️ Tags", &record.analysis.tags);
        push_tag_section(&mut md, "## 🗂️ Categories", &record.analysis.categories);
        push_tag_section(&mut md, "## 🔍 Objects", &record.analysis.objects);

        // Footer
        md.push_str("---\n");
        md.push_str("*Generated by img-lens*\n");

        fs::write(&path, md)
            .await
            .map_err(|e| DomainError::Report(format!("write report: {}", e)))?;

        info!(path = %path.display(), "report generated");

        Ok(path)
    }
}

fn push_tag_section(md: &mut String, heading: &str, tags: &[Tag]) {
    if tags.is_empty() {
        return;
    }
    md.push_str(heading);
    md.push_str("\n\n");
    for tag in tags {
        md.push_str(&format!("- {} ({:.2})\n", tag.name, tag.confidence));
    }
    md.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ImageAnalysis, ImageRecord, ImageSummary};
    use crate::ports::ImageRepoPort;
    use base64::{engine::general_purpose, Engine as _};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeVision {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl VisionPort for FakeVision {
        async fn analyze(&self, image: &[u8]) -> Result<ImageAnalysis, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ImageAnalysis {
                description: format!("an image of {} bytes", image.len()),
                tags: vec![
                    Tag::new("image", 0.99),
                    Tag::new(format!("size-{}", image.len()), 0.5),
                ],
                categories: Vec::new(),
                objects: Vec::new(),
            })
        }
    }

    #[derive(Default)]
    struct FakeLog {
        rows: Mutex<HashMap<(i64, i64), AnalysisRecord>>,
    }

    #[async_trait::async_trait]
    impl AnalysisLogPort for FakeLog {
        async fn save_analysis(&self, record: &AnalysisRecord) -> Result<(), DomainError> {
            self.rows
                .lock()
                .unwrap()
                .insert((record.user_id, record.image_id), record.clone());
            Ok(())
        }

        async fn get_analysis(
            &self,
            user_id: i64,
            image_id: i64,
        ) -> Result<Option<AnalysisRecord>, DomainError> {
            Ok(self.rows.lock().unwrap().get(&(user_id, image_id)).cloned())
        }

        async fn get_history(&self, user_id: i64) -> Result<Vec<AnalysisRecord>, DomainError> {
            let rows = self.rows.lock().unwrap();
            let mut out: Vec<AnalysisRecord> = rows
                .values()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect();
            out.sort_by(|a, b| b.analyzed_at.cmp(&a.analyzed_at));
            Ok(out)
        }
    }

    #[derive(Default)]
    struct FakeImages {
        rows: Mutex<Vec<ImageRecord>>,
    }

    impl FakeImages {
        fn seed(&self, user_id: i64, filename: &str, bytes: &[u8]) -> i64 {
            let mut rows = self.rows.lock().unwrap();
            let id = rows.len() as i64 + 1;
            rows.push(ImageRecord {
                id,
                user_id,
                filename: filename.to_string(),
                content_base64: general_purpose::STANDARD.encode(bytes),
                byte_len: bytes.len() as i64,
                uploaded_at: id,
            });
            id
        }
    }

    #[async_trait::async_trait]
    impl ImageRepoPort for FakeImages {
        async fn save_image(
            &self,
            user_id: i64,
            filename: &str,
            content_base64: &str,
            byte_len: i64,
        ) -> Result<ImageRecord, DomainError> {
            let mut rows = self.rows.lock().unwrap();
            let record = ImageRecord {
                id: rows.len() as i64 + 1,
                user_id,
                filename: filename.to_string(),
                content_base64: content_base64.to_string(),
                byte_len,
                uploaded_at: 0,
            };
            rows.push(record.clone());
            Ok(record)
        }

        async fn list_images(&self, user_id: i64) -> Result<Vec<ImageSummary>, DomainError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .rev()
                .filter(|r| r.user_id == user_id)
                .map(|r| ImageSummary {
                    id: r.id,
                    user_id: r.user_id,
                    filename: r.filename.clone(),
                    byte_len: r.byte_len,
                    uploaded_at: r.uploaded_at,
                })
                .collect())
        }

        async fn get_image(
            &self,
            user_id: i64,
            image_id: i64,
        ) -> Result<Option<ImageRecord>, DomainError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .find(|r| r.user_id == user_id && r.id == image_id)
                .cloned())
        }
    }

    fn reports_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("img-lens-reports-{}-{}", std::process::id(), tag))
    }

    fn service(
        images: Arc<FakeImages>,
        tag: &str,
    ) -> (AnalysisService, Arc<FakeVision>, Arc<FakeLog>) {
        let vision = Arc::new(FakeVision {
            calls: AtomicUsize::new(0),
        });
        let log = Arc::new(FakeLog::default());
        let library = Arc::new(LibraryService::new(
            images as Arc<dyn ImageRepoPort>,
            1024 * 1024,
        ));
        let service = AnalysisService::new(
            Arc::clone(&vision) as Arc<dyn VisionPort>,
            library,
            Arc::clone(&log) as Arc<dyn AnalysisLogPort>,
            reports_dir(tag),
        );
        (service, vision, log)
    }

    #[tokio::test]
    async fn test_second_ensure_analysis_serves_the_log() {
        let images = Arc::new(FakeImages::default());
        let image_id = images.seed(7, "cat.jpg", b"\xff\xd8\xffcat bytes");
        let (service, vision, _) = service(Arc::clone(&images), "log-hit");

        let first = service.ensure_analysis(7, image_id).await.unwrap();
        let second = service.ensure_analysis(7, image_id).await.unwrap();

        assert_eq!(vision.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.analysis, second.analysis);
        assert_eq!(second.filename, "cat.jpg");

        tokio::fs::remove_dir_all(reports_dir("log-hit")).await.ok();
    }

    #[tokio::test]
    async fn test_ensure_analysis_writes_a_report() {
        let images = Arc::new(FakeImages::default());
        let image_id = images.seed(7, "cat.jpg", b"\xff\xd8\xffcat bytes");
        let (service, _, _) = service(Arc::clone(&images), "report");

        let record = service.ensure_analysis(7, image_id).await.unwrap();

        let report = tokio::fs::read_to_string(service.report_path(image_id))
            .await
            .unwrap();
        assert!(report.contains("# Image Analysis: cat.jpg"));
        assert!(report.contains(&record.analysis.description));
        assert!(report.contains("- image (0.99)"));

        tokio::fs::remove_dir_all(reports_dir("report")).await.ok();
    }

    #[tokio::test]
    async fn test_log_hit_recreates_a_missing_report() {
        let images = Arc::new(FakeImages::default());
        let image_id = images.seed(7, "cat.jpg", b"\xff\xd8\xffcat bytes");
        let (service, vision, _) = service(Arc::clone(&images), "recreate");

        service.ensure_analysis(7, image_id).await.unwrap();
        let path = service.report_path(image_id);
        tokio::fs::remove_file(&path).await.unwrap();

        service.ensure_analysis(7, image_id).await.unwrap();
        assert!(tokio::fs::try_exists(&path).await.unwrap());
        assert_eq!(vision.calls.load(Ordering::SeqCst), 1); // served from the log

        tokio::fs::remove_dir_all(reports_dir("recreate")).await.ok();
    }

    #[tokio::test]
    async fn test_analyze_library_skips_already_analyzed_images() {
        let images = Arc::new(FakeImages::default());
        let first = images.seed(7, "one.png", b"\x89PNGone");
        let _second = images.seed(7, "two.png", b"\x89PNGtwo-longer");
        let (service, vision, _) = service(Arc::clone(&images), "skip");

        service.ensure_analysis(7, first).await.unwrap();
        assert_eq!(vision.calls.load(Ordering::SeqCst), 1);

        let reports = service.analyze_library(7).await.unwrap();
        assert_eq!(reports.len(), 1); // only the second image was new
        assert_eq!(vision.calls.load(Ordering::SeqCst), 2);

        // A second pass finds nothing left to do.
        assert!(service.analyze_library(7).await.unwrap().is_empty());
        assert_eq!(vision.calls.load(Ordering::SeqCst), 2);

        tokio::fs::remove_dir_all(reports_dir("skip")).await.ok();
    }

    #[tokio::test]
    async fn test_analyze_library_with_empty_library_is_a_no_op() {
        let images = Arc::new(FakeImages::default());
        let (service, vision, _) = service(images, "empty");

        assert!(service.analyze_library(7).await.unwrap().is_empty());
        assert_eq!(vision.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_history_is_scoped_per_user() {
        let images = Arc::new(FakeImages::default());
        let mine = images.seed(7, "mine.png", b"\x89PNGmine");
        let theirs = images.seed(8, "theirs.png", b"\x89PNGtheirs!");
        let (service, _, _) = service(Arc::clone(&images), "history");

        service.ensure_analysis(7, mine).await.unwrap();
        service.ensure_analysis(8, theirs).await.unwrap();

        let history = service.history(7).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].filename, "mine.png");

        tokio::fs::remove_dir_all(reports_dir("history")).await.ok();
    }
}
