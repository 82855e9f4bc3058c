use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;

use crate::{
    config::Config, content::CmsGateway, error::Result, limiter::RateLimiter,
    sanitize::HtmlSanitizer, views::ViewCounter,
};

/// 浏览量写接口的限流参数
#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    pub limit: u32,
    pub window: Duration,
    /// 为 `false` 时只按对端地址识别客户端
    pub trust_proxy_headers: bool,
}

/// 应用程序上下文
///
/// [`AppState`] 持有内容网关、浏览量计数器、限流器和 HTML 清理器，
/// 全部由配置显式构造，不依赖进程级单例。
#[derive(Clone, FromRef)]
pub struct AppState {
    gateway: CmsGateway,
    views: ViewCounter,
    limiter: Arc<RateLimiter>,
    rate_policy: RatePolicy,
    sanitizer: HtmlSanitizer,
}

impl AppState {
    /// 创建一个新的 [`AppState`] 实例
    pub fn new(
        gateway: CmsGateway,
        views: ViewCounter,
        limiter: RateLimiter,
        rate_policy: RatePolicy,
        sanitizer: HtmlSanitizer,
    ) -> Self {
        Self {
            gateway,
            views,
            limiter: Arc::new(limiter),
            rate_policy,
            sanitizer,
        }
    }

    /// 按配置构造所有组件，需要在 tokio 运行时内调用
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            CmsGateway::new(config)?,
            crate::views::spawn_from_config(config),
            RateLimiter::new(config.rate_limit_max_entries),
            RatePolicy {
                limit: config.views_rate_limit,
                window: config.views_rate_window(),
                trust_proxy_headers: config.trust_proxy_headers,
            },
            HtmlSanitizer::new(config.sanitizer),
        ))
    }
}
