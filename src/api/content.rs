use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::Query;
use serde::{Deserialize, Serialize};

use super::{ApiError, Result};

use crate::{
    content::{CmsGateway, Page, Post, Term},
    sanitize::HtmlSanitizer,
    state::AppState,
    views::ViewCounter,
};

/// 配置内容相关路由。
///
/// 路由包括：
/// - `GET /posts`：文章列表
/// - `GET /posts/count`：已发布文章总数
/// - `GET /posts/slugs`：所有文章 slug
/// - `GET /posts/{slug}`：获取单篇文章，并在后台记录一次浏览
/// - `GET /pages/{slug}`：获取单个页面
/// - `GET /categories`、`GET /tags`：分类和标签
/// - `GET /search`：搜索文章
/// - `POST /sanitize`：清理一段 HTML
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/posts", get(post_list))
        .route("/posts/count", get(post_count))
        .route("/posts/slugs", get(post_slugs))
        .route("/posts/{slug}", get(post_detail))
        .route("/pages/{slug}", get(page_detail))
        .route("/categories", get(category_list))
        .route("/tags", get(tag_list))
        .route("/search", get(search))
        .route("/sanitize", post(sanitize))
}

/// 分页参数
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PageParams {
    page: u32,
    per_page: u32,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

/// 搜索参数
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    q: String,
    page: u32,
    per_page: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        let paging = PageParams::default();
        Self {
            q: String::new(),
            page: paging.page,
            per_page: paging.per_page,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Total {
    total: u64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HtmlBody {
    html: String,
}

/// 输出前清理文章中的 CMS HTML
fn sanitized(mut post: Post, sanitizer: &HtmlSanitizer) -> Post {
    post.content.raw = sanitizer.sanitize(&post.content.raw);
    post.content.text = sanitizer.sanitize(&post.content.text);
    post
}

fn sanitized_all(posts: Vec<Post>, sanitizer: &HtmlSanitizer) -> Vec<Post> {
    posts.into_iter().map(|p| sanitized(p, sanitizer)).collect()
}

/// 获取文章列表。
async fn post_list(
    Query(params): Query<PageParams>,
    State(gateway): State<CmsGateway>,
    State(sanitizer): State<HtmlSanitizer>,
) -> Json<Vec<Post>> {
    let posts = gateway.list_posts(params.page, params.per_page).await;
    Json(sanitized_all(posts, &sanitizer))
}

async fn post_count(State(gateway): State<CmsGateway>) -> Json<Total> {
    Json(Total {
        total: gateway.total_published_count().await,
    })
}

async fn post_slugs(State(gateway): State<CmsGateway>) -> Json<Vec<String>> {
    Json(gateway.list_post_slugs().await)
}

/// 根据 slug 获取单篇文章。
///
/// 浏览记录在后台完成，不阻塞响应；文章不存在时返回 [`ApiError::NotFound`]。
async fn post_detail(
    Path(slug): Path<String>,
    State(gateway): State<CmsGateway>,
    State(views): State<ViewCounter>,
    State(sanitizer): State<HtmlSanitizer>,
) -> Result<Json<Post>> {
    let post = gateway
        .get_post_by_slug(&slug)
        .await
        .ok_or(ApiError::NotFound)?;

    views.track(post.id);

    Ok(Json(sanitized(post, &sanitizer)))
}

async fn page_detail(
    Path(slug): Path<String>,
    State(gateway): State<CmsGateway>,
    State(sanitizer): State<HtmlSanitizer>,
) -> Result<Json<Page>> {
    let mut page = gateway
        .get_page_by_slug(&slug)
        .await
        .ok_or(ApiError::NotFound)?;
    page.content = sanitizer.sanitize(&page.content);

    Ok(Json(page))
}

async fn category_list(State(gateway): State<CmsGateway>) -> Json<Vec<Term>> {
    Json(gateway.list_categories().await)
}

async fn tag_list(State(gateway): State<CmsGateway>) -> Json<Vec<Term>> {
    Json(gateway.list_tags().await)
}

/// 搜索文章，空查询返回空列表。
async fn search(
    Query(params): Query<SearchParams>,
    State(gateway): State<CmsGateway>,
    State(sanitizer): State<HtmlSanitizer>,
) -> Json<Vec<Post>> {
    let posts = gateway
        .search_posts(&params.q, params.page, params.per_page)
        .await;
    Json(sanitized_all(posts, &sanitizer))
}

async fn sanitize(
    State(sanitizer): State<HtmlSanitizer>,
    Json(body): Json<HtmlBody>,
) -> Json<HtmlBody> {
    Json(HtmlBody {
        html: sanitizer.sanitize(&body.html),
    })
}
