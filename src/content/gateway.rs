use std::{sync::Arc, time::Duration};

use axum::http::{HeaderMap, HeaderValue};
use moka::future::Cache;
use reqwest::{StatusCode, header};
use serde::de::DeserializeOwned;
use tracing::instrument;

use super::model::{Page, Post, RawPage, RawPost, RawSlug, RawTerm, Term};
use super::normalize::{normalize_page, normalize_post, normalize_term};
use super::samples::SampleData;
use crate::config::Config;
use crate::error::{ApiError, Error, Result};

/// 分类一次最多取回的数量
pub const CATEGORIES_LIMIT: u32 = 100;

/// 标签一次最多取回的数量
pub const TAGS_LIMIT: u32 = 20;

/// CMS 单页允许的最大条数
pub const MAX_PER_PAGE: u32 = 100;

const TOTAL_HEADER: &str = "X-WP-Total";

/// 认证转发的目标接口
#[derive(Debug, Clone, Copy)]
pub enum AuthEndpoint {
    /// `jwt-auth/v1/token`
    Token,
    /// `wp/v2/users/register`
    Register,
}

impl AuthEndpoint {
    fn path(self) -> &'static str {
        match self {
            AuthEndpoint::Token => "jwt-auth/v1/token",
            AuthEndpoint::Register => "wp/v2/users/register",
        }
    }
}

/// 缓存的原始响应体和总数头
#[derive(Clone)]
struct CachedResponse {
    body: Arc<str>,
    total: Option<u64>,
}

struct Fetched<T> {
    data: T,
    total: Option<u64>,
}

#[derive(Clone)]
struct Remote {
    client: reqwest::Client,
    base_url: Arc<str>,
    /// `None` 表示关闭缓存
    cache: Option<Cache<String, CachedResponse>>,
}

/// 内容网关
///
/// 从 CMS 拉取文章、页面、分类和标签，并归一化为 [`Post`]、[`Page`]、[`Term`]。
///
/// - 未配置 CMS 地址时直接使用 [`SampleData`]
/// - 任何远程请求失败（网络错误、超时、非 2xx、响应体无法解析）都会记录 warn
///   日志并回退到示例数据，读操作不会把错误抛给调用方
/// - 成功的响应按请求 URL 缓存 `revalidate` 时长，回退值不进入缓存
#[derive(Clone)]
pub struct CmsGateway {
    remote: Option<Remote>,
    samples: Arc<SampleData>,
}

impl CmsGateway {
    /// 根据配置创建网关
    ///
    /// `cms_base_url` 为空时进入示例数据模式。
    pub fn new(config: &Config) -> Result<Self> {
        let remote = match &config.cms_base_url {
            Some(base_url) => Some(Remote {
                client: build_client(config.cms_timeout())?,
                base_url: Arc::from(base_url.as_str()),
                cache: new_cache(config.revalidate()),
            }),
            None => None,
        };

        if remote.is_none() {
            tracing::info!("no cms configured, serving sample data");
        }

        Ok(Self {
            remote,
            samples: Arc::new(SampleData::default()),
        })
    }

    /// 仅使用示例数据的网关
    pub fn sample_only() -> Self {
        Self {
            remote: None,
            samples: Arc::new(SampleData::default()),
        }
    }

    pub fn is_sample_mode(&self) -> bool {
        self.remote.is_none()
    }

    /// 分页获取已发布文章，按发布时间倒序
    #[instrument(skip(self))]
    pub async fn list_posts(&self, page: u32, per_page: u32) -> Vec<Post> {
        let (page, per_page) = clamp_page(page, per_page);
        let Some(remote) = &self.remote else {
            return self.samples.page(page, per_page);
        };

        let result = remote
            .get_json::<Vec<RawPost>>(
                "wp/v2/posts",
                &[
                    ("_embed", "1".to_string()),
                    ("page", page.to_string()),
                    ("per_page", per_page.to_string()),
                    ("status", RawPost::PUBLISHED.to_string()),
                ],
            )
            .await
            .map(|fetched| published(fetched.data));

        or_fallback("list_posts", result, || self.samples.page(page, per_page))
    }

    /// 按 slug 精确查找文章
    #[instrument(skip(self))]
    pub async fn get_post_by_slug(&self, slug: &str) -> Option<Post> {
        let Some(remote) = &self.remote else {
            return self.samples.by_slug(slug);
        };

        let result = remote
            .get_json::<Vec<RawPost>>(
                "wp/v2/posts",
                &[
                    ("slug", slug.to_string()),
                    ("_embed", "1".to_string()),
                    ("status", RawPost::PUBLISHED.to_string()),
                ],
            )
            .await
            .map(|fetched| {
                published(fetched.data)
                    .into_iter()
                    .find(|post| post.slug == slug)
            });

        or_fallback("get_post_by_slug", result, || self.samples.by_slug(slug))
    }

    /// 列出所有已发布文章的 slug
    #[instrument(skip(self))]
    pub async fn list_post_slugs(&self) -> Vec<String> {
        let sample_slugs = || -> Vec<String> {
            self.samples
                .posts()
                .iter()
                .map(|post| post.slug.clone())
                .collect()
        };
        let Some(remote) = &self.remote else {
            return sample_slugs();
        };

        let result = remote
            .get_json::<Vec<RawSlug>>(
                "wp/v2/posts",
                &[
                    ("per_page", MAX_PER_PAGE.to_string()),
                    ("_fields", "slug".to_string()),
                    ("status", RawPost::PUBLISHED.to_string()),
                ],
            )
            .await
            .map(|fetched| fetched.data.into_iter().map(|s| s.slug).collect());

        or_fallback("list_post_slugs", result, sample_slugs)
    }

    /// 按 slug 获取页面，示例数据中没有页面
    #[instrument(skip(self))]
    pub async fn get_page_by_slug(&self, slug: &str) -> Option<Page> {
        let remote = self.remote.as_ref()?;

        let result = remote
            .get_json::<Vec<RawPage>>("wp/v2/pages", &[("slug", slug.to_string())])
            .await
            .map(|fetched| {
                fetched
                    .data
                    .into_iter()
                    .find(|page| page.slug == slug)
                    .map(normalize_page)
            });

        or_fallback("get_page_by_slug", result, || None)
    }

    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Vec<Term> {
        self.list_terms("wp/v2/categories", CATEGORIES_LIMIT, || {
            self.samples.categories().to_vec()
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_tags(&self) -> Vec<Term> {
        self.list_terms("wp/v2/tags", TAGS_LIMIT, || self.samples.tags().to_vec())
            .await
    }

    async fn list_terms(
        &self,
        path: &str,
        limit: u32,
        fallback: impl FnOnce() -> Vec<Term>,
    ) -> Vec<Term> {
        let Some(remote) = &self.remote else {
            return fallback();
        };

        let result = remote
            .get_json::<Vec<RawTerm>>(path, &[("per_page", limit.to_string())])
            .await
            .map(|fetched| fetched.data.into_iter().map(normalize_term).collect());

        or_fallback(path, result, fallback)
    }

    /// 全文搜索，线上由 CMS 的 `search` 参数完成，空查询不返回结果
    #[instrument(skip(self))]
    pub async fn search_posts(&self, query: &str, page: u32, per_page: u32) -> Vec<Post> {
        let (page, per_page) = clamp_page(page, per_page);
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let Some(remote) = &self.remote else {
            return self.samples.search(query, page, per_page);
        };

        let result = remote
            .get_json::<Vec<RawPost>>(
                "wp/v2/posts",
                &[
                    ("search", query.to_string()),
                    ("_embed", "1".to_string()),
                    ("page", page.to_string()),
                    ("per_page", per_page.to_string()),
                    ("status", RawPost::PUBLISHED.to_string()),
                ],
            )
            .await
            .map(|fetched| published(fetched.data));

        or_fallback("search_posts", result, || {
            self.samples.search(query, page, per_page)
        })
    }

    /// 已发布文章总数，读取 `X-WP-Total` 响应头
    #[instrument(skip(self))]
    pub async fn total_published_count(&self) -> u64 {
        let sample_total = || -> u64 { self.samples.posts().len() as u64 };
        let Some(remote) = &self.remote else {
            return sample_total();
        };

        let result = remote
            .get_json::<serde_json::Value>(
                "wp/v2/posts",
                &[
                    ("per_page", "1".to_string()),
                    ("_fields", "id".to_string()),
                    ("status", RawPost::PUBLISHED.to_string()),
                ],
            )
            .await
            .and_then(|fetched| {
                fetched
                    .total
                    .ok_or(Error::MissingHeader(TOTAL_HEADER))
            });

        or_fallback("total_published_count", result, sample_total)
    }

    /// 将认证请求原样转发给 CMS，返回上游状态码和 JSON 响应体
    ///
    /// 示例数据模式下没有可转发的目标，返回 [`ApiError::Unavailable`]。
    #[instrument(skip(self, body))]
    pub async fn forward_auth(
        &self,
        endpoint: AuthEndpoint,
        body: &serde_json::Value,
    ) -> Result<(StatusCode, serde_json::Value)> {
        let remote = self.remote.as_ref().ok_or(ApiError::Unavailable)?;

        let resp = remote
            .client
            .post(remote.url(endpoint.path()))
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        let body = serde_json::from_str(&text)
            .unwrap_or_else(|_| serde_json::json!({ "message": text }));

        Ok((status, body))
    }
}

impl Remote {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// 发送 GET 请求并解析 JSON，命中缓存时不访问 CMS
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Fetched<T>> {
        let request = self.client.get(self.url(path)).query(params).build()?;
        let key = request.url().to_string();

        if let Some(cache) = &self.cache {
            if let Some(entry) = cache.get(&key).await {
                tracing::debug!(%key, "cache hit");
                return Ok(Fetched {
                    data: serde_json::from_str(&entry.body)?,
                    total: entry.total,
                });
            }
        }

        let resp = self.client.execute(request).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Upstream(status));
        }

        let total = resp
            .headers()
            .get(TOTAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let body = resp.text().await?;
        let data = serde_json::from_str(&body)?;

        if let Some(cache) = &self.cache {
            let entry = CachedResponse {
                body: Arc::from(body),
                total,
            };
            cache.insert(key, entry).await;
        }

        Ok(Fetched { data, total })
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .default_headers({
            let mut headers = HeaderMap::new();
            headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
            headers
        })
        .timeout(timeout)
        .build()?;
    Ok(client)
}

fn new_cache(ttl: Duration) -> Option<Cache<String, CachedResponse>> {
    (!ttl.is_zero()).then(|| Cache::builder().max_capacity(1000).time_to_live(ttl).build())
}

fn clamp_page(page: u32, per_page: u32) -> (u32, u32) {
    (page.max(1), per_page.clamp(1, MAX_PER_PAGE))
}

fn published(posts: Vec<RawPost>) -> Vec<Post> {
    posts
        .into_iter()
        .filter(RawPost::is_published)
        .map(normalize_post)
        .collect()
}

fn or_fallback<T>(operation: &str, result: Result<T>, fallback: impl FnOnce() -> T) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!(operation, error = %e, "cms request failed, using fallback");
        fallback()
    })
}
