use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use super::Result;

use crate::{
    content::{AuthEndpoint, CmsGateway},
    state::AppState,
};

/// 配置认证转发路由。
///
/// 请求体原样转发给 CMS 的 JWT 接口，状态码和响应体原样返回。
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
}

async fn login(
    State(gateway): State<CmsGateway>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response> {
    forward(&gateway, AuthEndpoint::Token, &body).await
}

async fn register(
    State(gateway): State<CmsGateway>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response> {
    forward(&gateway, AuthEndpoint::Register, &body).await
}

async fn forward(
    gateway: &CmsGateway,
    endpoint: AuthEndpoint,
    body: &serde_json::Value,
) -> Result<Response> {
    let (status, body) = gateway.forward_auth(endpoint, body).await?;
    Ok((status, Json(body)).into_response())
}
