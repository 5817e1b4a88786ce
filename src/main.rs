//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run UI.
//! No business logic here; every flow lives in a use-case service.

use dotenv::dotenv;
use img_lens::adapters::persistence::{session_json::SessionJson, sqlite_repo::SqliteRepo};
use img_lens::adapters::ui::tui::TuiInputPort;
use img_lens::adapters::vision::{AzureVisionAdapter, MockVisionAdapter};
use img_lens::ports::{
    AnalysisLogPort, ImageRepoPort, InputPort, SessionPort, UserRepoPort, VisionPort,
};
use img_lens::usecases::{AnalysisService, AuthService, ComparisonService, LibraryService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    img_lens::adapters::ui::init_ui();

    let cfg = img_lens::shared::config::AppConfig::load().unwrap_or_default();

    let data_dir = cfg.data_dir.as_deref().unwrap_or("./data").to_string();
    let data_path = PathBuf::from(&data_dir);
    let data_dir_abs = data_path
        .canonicalize()
        .unwrap_or_else(|_| data_path.clone());
    info!(
        path = %data_dir_abs.display(),
        "data directory: {}",
        data_dir_abs.display()
    );
    let session_path = cfg
        .session_path
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| data_path.join("session.json"));

    // --- Persistence: one SQLite repo implements all three storage ports ---
    let sqlite_repo = Arc::new(
        SqliteRepo::connect(&data_path)
            .await
            .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
    );
    let users: Arc<dyn UserRepoPort> = Arc::clone(&sqlite_repo) as Arc<dyn UserRepoPort>;
    let images: Arc<dyn ImageRepoPort> = Arc::clone(&sqlite_repo) as Arc<dyn ImageRepoPort>;
    let analysis_log: Arc<dyn AnalysisLogPort> =
        Arc::clone(&sqlite_repo) as Arc<dyn AnalysisLogPort>;

    let session_impl = SessionJson::new(&session_path);
    session_impl
        .load()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let session: Arc<dyn SessionPort> = Arc::new(session_impl);

    // --- Vision adapter (Azure when configured, mock otherwise) ---
    let vision: Arc<dyn VisionPort> = if cfg.is_vision_configured() {
        info!(
            endpoint = %cfg.vision_endpoint().unwrap_or_default(),
            "vision analysis enabled with Azure adapter"
        );
        Arc::new(AzureVisionAdapter::new(
            cfg.vision_endpoint().unwrap_or_default(),
            cfg.vision_key().unwrap_or_default(),
            cfg.vision_delay_ms,
        ))
    } else {
        warn!("IMG_LENS_VISION_KEY not set, using mock vision adapter");
        Arc::new(MockVisionAdapter::new())
    };

    // --- Services ---
    let auth_service = Arc::new(AuthService::new(
        users,
        session,
        cfg.bcrypt_cost_or_default(),
    ));
    let library_service = Arc::new(LibraryService::new(images, cfg.max_image_bytes_or_default()));
    let reports_dir = data_path.join("reports");
    let analysis_service = Arc::new(AnalysisService::new(
        vision,
        Arc::clone(&library_service),
        analysis_log,
        reports_dir,
    ));
    let comparison_service = Arc::new(ComparisonService::new(Arc::clone(&analysis_service)));

    let input_port: Arc<dyn InputPort> = Arc::new(TuiInputPort::new(
        auth_service,
        library_service,
        analysis_service,
        comparison_service,
    ));

    // --- Run (auth menu -> library menu) ---
    input_port
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
