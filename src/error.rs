use std::io;

use axum::{Json, response::IntoResponse};
use reqwest::StatusCode;
use serde_json::json;

pub type Result<T> = core::result::Result<T, Error>;

/// 请求级别的错误，直接映射为客户端可见的状态码
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not Found")]
    NotFound,

    #[error("Too Many Requests")]
    TooManyRequests,

    #[error("{0}")]
    BadRequest(String),

    /// 未配置 CMS 时无法转发的请求
    #[error("Service Unavailable")]
    Unavailable,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    /// CMS 返回了非 2xx 状态码
    #[error("upstream responded with {0}")]
    Upstream(StatusCode),

    #[error("missing response header {0}")]
    MissingHeader(&'static str),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Persist(#[from] tempfile::PersistError),

    /// 计数 actor 已退出，无法再处理请求
    #[error("view counter stopped")]
    CounterStopped,

    #[error(transparent)]
    ApiError(#[from] ApiError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        match self {
            Error::Reqwest(e) => {
                tracing::warn!(%e, "cms request error");
                (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
            }
            Error::Upstream(status) => {
                tracing::warn!(%status, "cms responded with error status");
                (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
            }
            Error::MissingHeader(name) => {
                tracing::warn!(name, "cms response missing header");
                (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
            }
            Error::ApiError(api_error) => match api_error {
                ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT FOUND").into_response(),
                ApiError::TooManyRequests => (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({ "success": false, "error": "Too many requests" })),
                )
                    .into_response(),
                ApiError::BadRequest(s) => (StatusCode::BAD_REQUEST, s).into_response(),
                ApiError::Unavailable => {
                    (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
                }
            },
            Error::Json(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
            e @ (Error::Toml(_)
            | Error::Config(_)
            | Error::Persist(_)
            | Error::CounterStopped
            | Error::Io(_)) => {
                tracing::error!(%e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}
