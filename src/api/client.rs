use std::{convert::Infallible, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::state::RatePolicy;

/// 用于限流的客户端标识
///
/// 默认只使用对端地址。[`RatePolicy::trust_proxy_headers`] 开启时，
/// 依次优先取 `X-Forwarded-For` 的第一个地址和 `X-Real-IP`。
/// 都拿不到时为 `unknown`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for ClientId
where
    RatePolicy: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let policy = RatePolicy::from_ref(state);

        let forwarded = policy
            .trust_proxy_headers
            .then(|| header_ip(&parts.headers))
            .flatten();
        let id = forwarded
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self(id))
    }
}

fn header_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next());
    let real_ip = headers.get("x-real-ip").and_then(|v| v.to_str().ok());

    forwarded
        .into_iter()
        .chain(real_ip)
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::{HeaderValue, Request};

    use super::*;

    fn policy(trust_proxy_headers: bool) -> RatePolicy {
        RatePolicy {
            limit: 10,
            window: Duration::from_secs(60),
            trust_proxy_headers,
        }
    }

    async fn extract(req: Request<()>, trust_proxy_headers: bool) -> ClientId {
        let (mut parts, _) = req.into_parts();
        ClientId::from_request_parts(&mut parts, &policy(trust_proxy_headers))
            .await
            .expect("提取失败")
    }

    fn forwarded_request() -> Request<()> {
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header("x-real-ip", "10.0.0.2")
            .body(())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        req
    }

    #[tokio::test]
    async fn test_forwarded_for_takes_first_hop_when_trusted() {
        assert_eq!(extract(forwarded_request(), true).await.as_str(), "203.0.113.9");
    }

    #[tokio::test]
    async fn test_headers_ignored_when_untrusted() {
        assert_eq!(extract(forwarded_request(), false).await.as_str(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_trusted_falls_back_to_connect_info() {
        let mut req = Request::builder().body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(extract(req, true).await.as_str(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_unknown_client() {
        let mut req = Request::builder().body(()).unwrap();
        req.headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static(" "));
        assert_eq!(extract(req, true).await.as_str(), "unknown");
    }
}
