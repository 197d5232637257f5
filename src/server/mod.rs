//! HTTP 服务器模块
//!
//! 每个存储查询以其 key 作为资源路径：
//! - `PUT /:key` 保存查询文本
//! - `DELETE /:key` 删除查询
//! - `GET /:key?name=value` 只读执行
//! - `POST /:key` JSON 请求体为写执行，其他内容类型为 CSV 批量导入

use crate::coerce::bind_query_params;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::ingest::{CancelFlag, IngestOptions};
use crate::response::Reply;
use crate::service::QueryService;
use crate::types::CanonicalValue;
use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task;
use tower_http::trace::TraceLayer;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QueryService>,
}

/// 构建路由
pub fn build_router(service: Arc<QueryService>, config: &ServerConfig) -> Router {
    let state = AppState { service };

    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        // 存储查询
        .route(
            "/:key",
            get(read_query)
                .put(store_query)
                .delete(remove_query)
                .post(post_query),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
}

/// 启动服务器
pub async fn start_server(config: ServerConfig, service: Arc<QueryService>) -> Result<()> {
    let app = build_router(service, &config);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Server(format!("绑定地址失败: {}", e)))?;
    tracing::info!(%addr, "服务器已启动");

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Server(format!("服务器错误: {}", e)))?;

    Ok(())
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InputFormat(_) => StatusCode::BAD_REQUEST,
            Error::UnknownKey(_) => StatusCode::NOT_FOUND,
            Error::RejectedMutation(_) => StatusCode::NOT_ACCEPTABLE,
            Error::Cancelled => StatusCode::CONFLICT,
            Error::QueryExecution(_)
            | Error::QueryParse(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "请求失败");
        }
        (status, self.to_string()).into_response()
    }
}

/// 在阻塞线程池上运行引擎调用
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Server(format!("任务执行失败: {}", e)))?
}

fn json_response(service: &QueryService, value: &CanonicalValue) -> Result<Response> {
    let body = service.codec().encode(value)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

// ==================== 处理器 ====================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus 格式指标
async fn metrics_handler(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.service.metrics().to_prometheus(),
    )
        .into_response()
}

/// 保存查询
async fn store_query(
    State(state): State<AppState>,
    Path(key): Path<String>,
    uri: Uri,
    body: String,
) -> Response {
    state.service.put(&key, &body);
    (StatusCode::CREATED, [(header::LOCATION, uri.path().to_string())]).into_response()
}

/// 删除查询
async fn remove_query(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode> {
    state.service.remove(&key)?;
    Ok(StatusCode::OK)
}

/// 只读执行，查询参数逐个转换类型，同名参数合并为列表
async fn read_query(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response> {
    let service = state.service.clone();
    let result = run_blocking(move || {
        let params = bind_query_params(pairs)?;
        service.read(&key, &params)
    })
    .await?;

    match result {
        Some(value) => json_response(&state.service, &value),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// CSV 导入参数
#[derive(Debug, Default, Deserialize)]
pub struct IngestParams {
    pub delim: Option<String>,
    pub batch: Option<String>,
}

impl IngestParams {
    fn resolve(&self, defaults: IngestOptions) -> Result<IngestOptions> {
        let mut options = defaults;
        if let Some(delim) = &self.delim {
            let mut chars = delim.chars();
            options.delimiter = match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(Error::InputFormat(format!(
                        "分隔符必须是单个字符: {:?}",
                        delim
                    )))
                }
            };
        }
        if let Some(batch) = &self.batch {
            options.batch_size = batch
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| Error::InputFormat(format!("批次大小无效: {}", batch)))?;
        }
        Ok(options)
    }
}

/// 请求处理被丢弃（客户端断开）时取消导入
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// 写执行或 CSV 导入，按内容类型区分
async fn post_query(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(ingest): Query<IngestParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let service = state.service.clone();

    if is_json(&headers) {
        let reply = run_blocking(move || service.write_json(&key, &body)).await?;
        return match reply {
            Reply::NoContent => Ok(StatusCode::NO_CONTENT.into_response()),
            Reply::Body(value) => json_response(&state.service, &value),
        };
    }

    let options = ingest.resolve(service.ingest_defaults())?;
    let flag = CancelFlag::new();
    let _guard = CancelOnDrop(flag.clone());
    let stats = run_blocking(move || service.ingest(&key, body.as_ref(), options, Some(flag))).await?;
    let body = serde_json::to_string(&stats)?;
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .map_err(|e| Error::Server(e.to_string()))?)
}
