pub mod handlers;

pub use handlers::{collect_questions, health_check, process_orders};

use crate::service::ReconciliationEngine;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;

/// 构建路由
pub fn router(engine: Arc<ReconciliationEngine>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/questions", post(collect_questions))
        .route("/api/process", post(process_orders))
        .with_state(engine)
        .layer(ServiceBuilder::new())
}
