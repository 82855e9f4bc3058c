use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// CMS 中的 `{ "rendered": "..." }` 字段
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rendered {
    #[serde(default)]
    pub rendered: String,
}

/// `wp/v2/posts` 返回的原始文章
#[derive(Debug, Clone, Deserialize)]
pub struct RawPost {
    pub id: u64,
    pub slug: String,
    pub date: NaiveDateTime,
    pub modified: NaiveDateTime,
    #[serde(default = "published")]
    pub status: String,
    #[serde(default)]
    pub title: Rendered,
    #[serde(default)]
    pub content: Rendered,
    #[serde(default)]
    pub excerpt: Rendered,
    #[serde(default)]
    pub author: u64,
    /// 0 表示没有特色图片
    #[serde(default)]
    pub featured_media: u64,
    #[serde(default)]
    pub categories: Vec<u64>,
    #[serde(default)]
    pub tags: Vec<u64>,
    #[serde(rename = "_embedded")]
    pub embedded: Option<Embedded>,
}

fn published() -> String {
    RawPost::PUBLISHED.to_string()
}

impl RawPost {
    pub const PUBLISHED: &str = "publish";

    pub fn is_published(&self) -> bool {
        self.status == Self::PUBLISHED
    }
}

/// `_embed` 附带的子资源
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Embedded {
    #[serde(default)]
    pub author: Vec<RawAuthor>,
    #[serde(rename = "wp:featuredmedia", default)]
    pub featured_media: Vec<RawMedia>,
}

/// 嵌入的作者
///
/// 作者资料不公开时 CMS 在同一位置返回 `{ "code": ..., "message": ... }` 错误对象，
/// 因此所有字段都可缺省，由 [`RawAuthor::is_resolved`] 判断是否可用。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAuthor {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar_urls: HashMap<String, String>,
    /// 仅错误对象带有
    pub code: Option<String>,
}

impl RawAuthor {
    pub fn is_resolved(&self) -> bool {
        self.code.is_none() && self.id != 0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMedia {
    pub source_url: Option<String>,
    #[serde(default)]
    pub alt_text: String,
    pub media_details: Option<MediaDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaDetails {
    #[serde(default)]
    pub sizes: HashMap<String, MediaSize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSize {
    pub source_url: String,
}

/// `wp/v2/pages` 返回的原始页面
#[derive(Debug, Clone, Deserialize)]
pub struct RawPage {
    pub id: u64,
    pub slug: String,
    pub modified: NaiveDateTime,
    #[serde(default)]
    pub title: Rendered,
    #[serde(default)]
    pub content: Rendered,
}

/// 分类和标签共用的原始结构
#[derive(Debug, Clone, Deserialize)]
pub struct RawTerm {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub description: String,
    /// 仅分类有 parent，0 表示顶级
    #[serde(default)]
    pub parent: u64,
}

/// `_fields=slug` 时的精简结构
#[derive(Debug, Deserialize)]
pub struct RawSlug {
    pub slug: String,
}

/// 同时保留原始 HTML 与解码后的文本
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TextField {
    pub raw: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Author {
    pub id: u64,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// 归一化后的文章
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: u64,
    pub slug: String,
    pub published_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
    /// `text` 为实体解码后的标题
    pub title: TextField,
    /// `text` 为实体解码后的正文 HTML
    pub content: TextField,
    /// `text` 为去除标签后的纯文本摘要
    pub excerpt: TextField,
    pub categories: Vec<u64>,
    pub tags: Vec<u64>,
    pub author_id: u64,
    pub featured_media_id: Option<u64>,
    pub featured_image: Option<String>,
    pub author: Option<Author>,
    pub reading_time: u32,
}

/// 归一化后的页面
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub id: u64,
    pub slug: String,
    pub modified_at: NaiveDateTime,
    pub title: TextField,
    pub content: String,
}

/// 分类或标签
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Term {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub count: u64,
    pub description: String,
    pub parent: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_post_deserializes_embedded_resources() {
        let json = r#"{
            "id": 7,
            "slug": "hello",
            "date": "2024-06-01T08:00:00",
            "modified": "2024-06-02T09:30:00",
            "title": { "rendered": "Hello &amp; bye" },
            "content": { "rendered": "<p>x</p>", "protected": false },
            "excerpt": { "rendered": "<p>x</p>" },
            "author": 3,
            "featured_media": 11,
            "categories": [1, 2],
            "tags": [],
            "_embedded": {
                "author": [{ "id": 3, "name": "Alice", "avatar_urls": { "96": "https://a/96.png" } }],
                "wp:featuredmedia": [{
                    "source_url": "https://img/full.jpg",
                    "media_details": { "sizes": { "large": { "source_url": "https://img/large.jpg" } } }
                }]
            }
        }"#;

        let post: RawPost = serde_json::from_str(json).expect("反序列化失败");
        assert_eq!(post.id, 7);
        assert!(post.is_published());
        assert_eq!(post.categories, vec![1, 2]);

        let embedded = post.embedded.expect("缺少 _embedded");
        assert_eq!(embedded.author[0].name, "Alice");
        assert_eq!(
            embedded.featured_media[0].source_url.as_deref(),
            Some("https://img/full.jpg")
        );
    }

    #[test]
    fn test_embedded_error_objects_do_not_reject_post() {
        let json = r#"[{
            "id": 8,
            "slug": "private-author",
            "date": "2024-06-01T08:00:00",
            "modified": "2024-06-01T08:00:00",
            "_embedded": {
                "author": [{
                    "code": "rest_user_invalid_id",
                    "message": "Invalid user ID.",
                    "data": { "status": 404 }
                }],
                "wp:featuredmedia": [{
                    "code": "rest_forbidden",
                    "message": "Sorry, you are not allowed to do that.",
                    "data": { "status": 401 }
                }]
            }
        }]"#;

        let posts: Vec<RawPost> = serde_json::from_str(json).expect("反序列化失败");
        let embedded = posts[0].embedded.as_ref().expect("缺少 _embedded");
        assert_eq!(embedded.author.len(), 1);
        assert!(!embedded.author[0].is_resolved());
        assert_eq!(embedded.featured_media[0].source_url, None);
    }

    #[test]
    fn test_raw_term_defaults() {
        let term: RawTerm =
            serde_json::from_str(r#"{ "id": 1, "name": "Rust", "slug": "rust" }"#).unwrap();
        assert_eq!(term.parent, 0);
        assert_eq!(term.count, 0);
    }
}
