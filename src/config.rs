use std::{env, path::PathBuf, str::FromStr, time::Duration};

use serde::Deserialize;

use crate::error::{Error, Result};

/// 计数存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewsBackend {
    /// 单个 JSON 文件
    Json,
    /// 仅内存，进程退出即丢失
    Memory,
}

impl FromStr for ViewsBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "memory" => Ok(Self::Memory),
            other => Err(Error::Config(format!("unknown views backend `{other}`"))),
        }
    }
}

/// HTML 清理引擎
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SanitizerEngine {
    Ammonia,
    /// 正则兜底实现，只移除 script、事件属性和 `javascript:`
    Basic,
}

impl FromStr for SanitizerEngine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ammonia" => Ok(Self::Ammonia),
            "basic" => Ok(Self::Basic),
            other => Err(Error::Config(format!("unknown sanitizer `{other}`"))),
        }
    }
}

/// 应用配置
///
/// 先读取 `PRESSNOTE_CONFIG` 指向的 TOML 文件（可选），再用环境变量覆盖。
/// 所有组件都通过构造参数拿到配置，不读取任何全局状态。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP 监听地址
    pub listen_addr: String,
    /// CMS REST 根地址，例如 `https://example.com/wp-json`；为空时进入示例数据模式
    pub cms_base_url: Option<String>,
    /// 单次 CMS 请求超时（秒）
    pub cms_timeout_secs: u64,
    /// CMS 响应缓存时间（秒），0 表示不缓存
    pub revalidate_secs: u64,
    pub views_backend: ViewsBackend,
    pub views_file: PathBuf,
    /// 每个客户端在一个窗口内允许的计数请求数
    pub views_rate_limit: u32,
    pub views_rate_window_ms: u64,
    /// 限流表超过该大小时清理过期条目
    pub rate_limit_max_entries: usize,
    /// 是否按 `X-Forwarded-For`/`X-Real-IP` 识别客户端，仅在可信反向代理之后开启
    pub trust_proxy_headers: bool,
    pub sanitizer: SanitizerEngine,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            cms_base_url: None,
            cms_timeout_secs: 10,
            revalidate_secs: 60,
            views_backend: ViewsBackend::Json,
            views_file: PathBuf::from("data/views.json"),
            views_rate_limit: 10,
            views_rate_window_ms: 60_000,
            rate_limit_max_entries: 10_000,
            trust_proxy_headers: false,
            sanitizer: SanitizerEngine::Ammonia,
        }
    }
}

impl Config {
    /// 从配置文件和环境变量加载配置
    pub fn load() -> Result<Self> {
        let config = match env::var("PRESSNOTE_CONFIG") {
            Ok(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
            Err(_) => Self::default(),
        };
        config.with_env_overrides()
    }

    /// 解析 TOML 配置，缺失字段取默认值
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(v) = var("LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Some(v) = var("CMS_BASE_URL") {
            self.cms_base_url = Some(v);
        }
        if let Some(v) = var("CMS_TIMEOUT_SECS") {
            self.cms_timeout_secs = parse("CMS_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("CMS_REVALIDATE_SECS") {
            self.revalidate_secs = parse("CMS_REVALIDATE_SECS", &v)?;
        }
        if let Some(v) = var("VIEWS_BACKEND") {
            self.views_backend = v.parse()?;
        }
        if let Some(v) = var("VIEWS_FILE") {
            self.views_file = PathBuf::from(v);
        }
        if let Some(v) = var("VIEWS_RATE_LIMIT") {
            self.views_rate_limit = parse("VIEWS_RATE_LIMIT", &v)?;
        }
        if let Some(v) = var("VIEWS_RATE_WINDOW_MS") {
            self.views_rate_window_ms = parse("VIEWS_RATE_WINDOW_MS", &v)?;
        }
        if let Some(v) = var("TRUST_PROXY_HEADERS") {
            self.trust_proxy_headers = parse("TRUST_PROXY_HEADERS", &v)?;
        }
        if let Some(v) = var("SANITIZER") {
            self.sanitizer = v.parse()?;
        }
        self.validate()
    }

    fn validate(mut self) -> Result<Self> {
        self.cms_base_url = self
            .cms_base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        if self.cms_timeout_secs == 0 {
            return Err(Error::Config("cms_timeout_secs must be > 0".into()));
        }
        if self.views_rate_limit == 0 {
            return Err(Error::Config("views_rate_limit must be > 0".into()));
        }
        if self.views_rate_window_ms == 0 {
            return Err(Error::Config("views_rate_window_ms must be > 0".into()));
        }
        Ok(self)
    }

    pub fn cms_timeout(&self) -> Duration {
        Duration::from_secs(self.cms_timeout_secs)
    }

    pub fn revalidate(&self) -> Duration {
        Duration::from_secs(self.revalidate_secs)
    }

    pub fn views_rate_window(&self) -> Duration {
        Duration::from_millis(self.views_rate_window_ms)
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("failed to parse {key}: `{value}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_uses_defaults_for_missing_fields() {
        let config = Config::from_toml(
            r#"
            cms_base_url = "https://example.com/wp-json/"
            views_backend = "memory"
            "#,
        )
        .expect("解析配置失败");

        assert_eq!(
            config.cms_base_url.as_deref(),
            Some("https://example.com/wp-json")
        );
        assert_eq!(config.views_backend, ViewsBackend::Memory);
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.revalidate(), Duration::from_secs(60));
        assert_eq!(config.sanitizer, SanitizerEngine::Ammonia);
        assert!(!config.trust_proxy_headers);
    }

    #[test]
    fn test_blank_base_url_means_sample_mode() {
        let config = Config::from_toml(r#"cms_base_url = "   ""#).expect("解析配置失败");
        assert!(config.cms_base_url.is_none());
    }

    #[test]
    fn test_zero_rate_limit_is_rejected() {
        let result = Config::from_toml("views_rate_limit = 0");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_engine_from_str() {
        assert_eq!(
            "Basic".parse::<SanitizerEngine>().unwrap(),
            SanitizerEngine::Basic
        );
        assert!("tidy".parse::<SanitizerEngine>().is_err());
        assert_eq!("json".parse::<ViewsBackend>().unwrap(), ViewsBackend::Json);
    }
}
