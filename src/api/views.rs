use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::Query;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{ApiError, ClientId, Result};

use crate::{
    content::{CmsGateway, MAX_PER_PAGE, Post},
    limiter::RateLimiter,
    state::{AppState, RatePolicy},
    views::ViewCounter,
};

/// 配置浏览量路由。
///
/// - `POST /views`：记录一次浏览，按客户端限流
/// - `GET /views`：按浏览量排序的文章列表
pub fn setup_route() -> Router<AppState> {
    Router::new().route("/views", get(ranked_posts).post(increment))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementBody {
    post_id: u64,
}

#[derive(Debug, Serialize)]
pub struct IncrementResult {
    success: bool,
    views: u64,
}

/// 排行榜中的文章，不含正文
#[derive(Debug, Serialize)]
pub struct RankedPost {
    id: u64,
    slug: String,
    title: String,
    excerpt: String,
    featured_image: Option<String>,
    published_at: NaiveDateTime,
    views: u64,
}

impl RankedPost {
    fn new(post: Post, views: u64) -> Self {
        Self {
            id: post.id,
            slug: post.slug,
            title: post.title.text,
            excerpt: post.excerpt.text,
            featured_image: post.featured_image,
            published_at: post.published_at,
            views,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RankParams {
    limit: usize,
}

impl Default for RankParams {
    fn default() -> Self {
        Self { limit: 5 }
    }
}

/// 记录一次浏览。
///
/// 超过限流返回 429；持久化失败时不报错，返回 `success: false` 和当前计数。
async fn increment(
    State(views): State<ViewCounter>,
    State(limiter): State<Arc<RateLimiter>>,
    State(policy): State<RatePolicy>,
    client: ClientId,
    Json(body): Json<IncrementBody>,
) -> Result<Json<IncrementResult>> {
    if body.post_id == 0 {
        return Err(ApiError::BadRequest("postId must be > 0".to_string()).into());
    }

    if !limiter.check_and_consume(client.as_str(), policy.limit, policy.window) {
        tracing::debug!(client = client.as_str(), "view increment rate limited");
        return Err(ApiError::TooManyRequests.into());
    }

    let result = match views.increment(body.post_id).await {
        Ok(count) => IncrementResult {
            success: true,
            views: count,
        },
        Err(e) => {
            // actor 已按 warn 记录持久化失败
            tracing::debug!(post_id = body.post_id, error = %e, "view increment not persisted");
            IncrementResult {
                success: false,
                views: views.get_one(body.post_id).await,
            }
        }
    };

    Ok(Json(result))
}

/// 按浏览量从高到低排序的文章，浏览量相同时较新的在前。
async fn ranked_posts(
    Query(params): Query<RankParams>,
    State(gateway): State<CmsGateway>,
    State(views): State<ViewCounter>,
) -> Json<Vec<RankedPost>> {
    let (posts, counts) = tokio::join!(gateway.list_posts(1, MAX_PER_PAGE), views.get_all());

    let mut ranked: Vec<RankedPost> = posts
        .into_iter()
        .map(|post| {
            let count = counts.get(&post.id).copied().unwrap_or(0);
            RankedPost::new(post, count)
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.views
            .cmp(&a.views)
            .then_with(|| b.published_at.cmp(&a.published_at))
    });
    ranked.truncate(params.limit.clamp(1, MAX_PER_PAGE as usize));

    Json(ranked)
}
