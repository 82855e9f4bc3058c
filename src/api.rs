mod auth;
mod client;
mod content;
mod views;

use std::net::SocketAddr;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::{
    error::{ApiError, Result},
    state::AppState,
};

pub use self::client::ClientId;

/// 设置应用的路由。
///
/// 将 `/api` 下的内容、浏览量、认证转发接口组合在一起，并绑定应用状态。
pub fn setup_route(app: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            content::setup_route()
                .merge(views::setup_route())
                .merge(auth::setup_route()),
        )
        .with_state(app)
}

/// 启动 HTTP 服务，并使用给定的路由处理请求。
///
/// 连接信息会注入请求扩展，供限流按对端地址识别客户端。
#[instrument(name = "http server", skip_all)]
pub async fn run_server_with_router(router: Router, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("listening on {addr}");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// 启动 HTTP 服务，自动设置路由和中间件。
///
/// 1. 生成路由
/// 2. 添加日志和追踪中间件
/// 3. 启动服务器
pub async fn run_server(app: AppState, addr: &str) -> Result<()> {
    let router = setup_route(app);
    let router = add_middlewares(router);
    run_server_with_router(router, addr).await
}

/// 为路由添加中间件，包括请求追踪和失败日志记录。
///
/// 日志记录会在请求失败时输出错误信息。
fn add_middlewares(router: Router) -> Router {
    fn log_failure(
        err: tower_http::classify::ServerErrorsFailureClass,
        _latency: std::time::Duration,
        _span: &tracing::Span,
    ) {
        tracing::error!(error = %err, "request failed");
    }

    router.layer(
        TraceLayer::new_for_http()
            .on_failure(log_failure)
            .on_request(|_req: &_, _span: &tracing::Span| {
                // 空实现，关闭请求日志
            }),
    )
}
