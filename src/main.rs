use dms_order_matcher::{api, AppConfig, ReconciliationEngine};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let engine = Arc::new(ReconciliationEngine::new(config));
    let app = api::router(engine);

    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/questions - 匹配并返回待确认问题");
    info!("  POST /api/process   - 按决策分配并输出结果表");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
