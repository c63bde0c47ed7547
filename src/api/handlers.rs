use crate::error::{AppError, Result};
use crate::models::{DecisionQuery, DecisionSet, OrderSheet, ReferenceData, ResolutionDecision, RunSummary};
use crate::service::ReconciliationEngine;
use crate::sheets::{
    load_orders, load_reference, write_workbook, Brand, BrandParams, ColumnOverrides, SUMMARY_FILE,
};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 请求体: 订单文件 + 参考文件 + 品牌参数
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub order_file: String,
    pub reference_file: String,
    pub brand: Brand,
    #[serde(default)]
    pub params: BrandParams,
    #[serde(default)]
    pub column_overrides: ColumnOverrides,
    #[serde(default)]
    pub selected_state: Option<String>,
}

/// 处理请求体: 在 RunRequest 基础上附带决策
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessRequest {
    #[serde(flatten)]
    pub run: RunRequest,
    #[serde(default)]
    pub decisions: Vec<ResolutionDecision>,
    #[serde(default)]
    pub output_dir: Option<String>,
}

/// 待确认问题响应体
#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub success: bool,
    pub message: String,
    pub queries: Option<Vec<DecisionQuery>>,
}

/// 处理结果响应体（含统计信息）
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    pub summary: Option<RunSummary>,
    pub files: Vec<String>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

fn load_inputs(req: &RunRequest) -> Result<(OrderSheet, ReferenceData)> {
    let reference = load_reference(Path::new(&req.reference_file), req.selected_state.as_deref())?;
    let orders = load_orders(
        Path::new(&req.order_file),
        req.brand,
        &req.params,
        &req.column_overrides,
    )?;
    Ok((orders, reference))
}

/// 解析错误属于调用方输入问题 (400)，其余为服务端错误 (500)
fn status_of(e: &AppError) -> StatusCode {
    if e.is_parse_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// 在阻塞线程池中执行 CPU 密集的处理流程
async fn run_blocking<T, F>(f: F) -> std::result::Result<T, (StatusCode, String)>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::error!("处理失败: {}", e);
            Err((status_of(&e), format!("Error: {}", e)))
        }
        Err(e) => {
            tracing::error!("处理任务异常: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)))
        }
    }
}

/// 第一步：返回需要人工确认的问题
pub async fn collect_questions(
    State(engine): State<Arc<ReconciliationEngine>>,
    Json(req): Json<RunRequest>,
) -> Response {
    let result = run_blocking(move || {
        let (orders, reference) = load_inputs(&req)?;
        Ok(engine.questions(orders, &reference))
    })
    .await;

    match result {
        Ok(queries) => {
            let response = QuestionsResponse {
                success: true,
                message: format!("{} questions need a decision", queries.len()),
                queries: Some(queries),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err((status, message)) => {
            let response = QuestionsResponse {
                success: false,
                message,
                queries: None,
            };
            (status, Json(response)).into_response()
        }
    }
}

/// 处理结果说明：输出为目录下每张表一个 CSV 加 summary.json，而非单个工作簿文件
fn processed_message(summary: &RunSummary, dir: &Path, file_count: usize) -> String {
    format!(
        "Processed {} lines: {} valid, {} partial, {} error, {} return; wrote {} CSV sheets and {} to {}",
        summary.total_lines,
        summary.valid_lines,
        summary.partial_lines,
        summary.error_lines,
        summary.return_lines,
        file_count.saturating_sub(1),
        SUMMARY_FILE,
        dir.display()
    )
}

/// 第二步：按决策分配、归类并写出结果
pub async fn process_orders(
    State(engine): State<Arc<ReconciliationEngine>>,
    Json(req): Json<ProcessRequest>,
) -> Response {
    let result = run_blocking(move || {
        let (orders, reference) = load_inputs(&req.run)?;
        let decisions: DecisionSet = req.decisions.into_iter().collect();
        let report = engine.run(orders, &reference, &decisions);

        let dir = req
            .output_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&engine.config().report.output_dir));
        let files = write_workbook(&report.workbook, &report.summary, &dir)?;
        let message = processed_message(&report.summary, &dir, files.len());
        Ok((report.summary, files, message))
    })
    .await;

    match result {
        Ok((summary, files, message)) => {
            let response = ProcessResponse {
                success: true,
                message,
                summary: Some(summary),
                files: files.iter().map(|p| p.display().to_string()).collect(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err((status, message)) => {
            let response = ProcessResponse {
                success: false,
                message,
                summary: None,
                files: Vec::new(),
            };
            (status, Json(response)).into_response()
        }
    }
}
