pub mod records;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use configs::HttpConfig;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::Health;

use crate::state::AppState;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Build the full application router: data routes, health probe and static assets
pub fn build_router(state: AppState, cors: CorsLayer, http: &HttpConfig) -> Router {
    // 数据接口：提交与查询，限制请求体大小
    let data = Router::new()
        .route("/api", post(records::submit))
        .route("/all", get(records::list_all))
        .layer(DefaultBodyLimit::max(http.body_limit_bytes))
        .with_state(state);

    // 其余路径交给静态文件目录（客户端页面）
    let static_dir = ServeDir::new(&http.static_dir);

    Router::new()
        .route("/health", get(health))
        .merge(data)
        .fallback_service(static_dir)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // 每次请求创建 span，包含方法和路径等，日志级别为 INFO
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(
                    DefaultOnRequest::new()
                        .level(Level::INFO),
                )
                // 响应返回时打点，包含状态码与耗时
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_failure(
                    DefaultOnFailure::new()
                        .level(Level::ERROR),
                ),
        )
}
