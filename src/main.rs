use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yaowiki_backend::config;
use yaowiki_backend::db;
use yaowiki_backend::manager::{ContentManager, ManagerSettings};
use yaowiki_backend::search::SearchEngine;
use yaowiki_backend::store::PrimaryStore;

/// 维护入口：跑迁移、从主存储全量重建搜索索引
///
/// 服务进程把本 crate 当库用；这个二进制只负责离线维护。
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yaowiki_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "yaowiki-backend {} (built {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME")
    );

    // Load configuration / 加载配置
    let app_config = config::load_config().expect("Failed to load configuration");

    // Create data directory if not exists / 创建数据目录
    let data_dir = app_config.get_data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Created data directory: {:?}", data_dir);
    }

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| app_config.get_database_url());

    let pool = db::connect(&database_url).await?;
    db::run_migrations(&pool).await?;

    let engine = Arc::new(SearchEngine::new());
    let manager = ContentManager::with_settings(
        PrimaryStore::new(pool),
        engine.clone(),
        ManagerSettings::from_config(&app_config),
    );

    let count = manager.rebuild_search_index().await?;

    let stats = engine.stats();
    tracing::info!(
        "✅ Index rebuild finished: {} documents, {} distinct tokens",
        count,
        stats.token_count
    );

    Ok(())
}
