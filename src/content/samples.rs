use chrono::{NaiveDate, NaiveDateTime};

use super::model::{Embedded, Post, RawAuthor, RawPost, RawTerm, Rendered, Term};
use super::normalize::{normalize_post, normalize_term, strip_html};

/// 未配置 CMS 或 CMS 不可用时使用的内置示例数据
///
/// 数据只在这里构造一次，经过与线上数据相同的归一化流程。
#[derive(Debug, Clone)]
pub struct SampleData {
    posts: Vec<Post>,
    categories: Vec<Term>,
    tags: Vec<Term>,
}

impl Default for SampleData {
    fn default() -> Self {
        Self {
            posts: sample_posts().into_iter().map(normalize_post).collect(),
            categories: sample_categories().into_iter().map(normalize_term).collect(),
            tags: sample_tags().into_iter().map(normalize_term).collect(),
        }
    }
}

impl SampleData {
    /// 所有示例文章，按发布时间倒序
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn categories(&self) -> &[Term] {
        &self.categories
    }

    pub fn tags(&self) -> &[Term] {
        &self.tags
    }

    /// 按页取示例文章，页码从 1 开始
    pub fn page(&self, page: u32, per_page: u32) -> Vec<Post> {
        paginate(&self.posts, page, per_page)
    }

    pub fn by_slug(&self, slug: &str) -> Option<Post> {
        self.posts.iter().find(|p| p.slug == slug).cloned()
    }

    /// 在标题、摘要、正文中做不区分大小写的子串匹配
    pub fn search(&self, query: &str, page: u32, per_page: u32) -> Vec<Post> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let matched: Vec<Post> = self
            .posts
            .iter()
            .filter(|post| {
                [
                    post.title.text.as_str(),
                    post.excerpt.text.as_str(),
                    &strip_html(&post.content.raw),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();

        paginate(&matched, page, per_page)
    }
}

fn paginate(posts: &[Post], page: u32, per_page: u32) -> Vec<Post> {
    let per_page = per_page.max(1) as usize;
    let offset = (page.max(1) as usize - 1).saturating_mul(per_page);

    posts.iter().skip(offset).take(per_page).cloned().collect()
}

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(9, 0, 0))
        .unwrap_or_default()
}

fn rendered(s: &str) -> Rendered {
    Rendered {
        rendered: s.to_string(),
    }
}

fn sample_author() -> Embedded {
    Embedded {
        author: vec![RawAuthor {
            id: 1,
            name: "Site Admin".to_string(),
            avatar_urls: Default::default(),
            code: None,
        }],
        featured_media: vec![],
    }
}

fn sample_posts() -> Vec<RawPost> {
    vec![
        RawPost {
            id: 3,
            slug: "building-a-headless-blog".to_string(),
            date: at(2024, 3, 12),
            modified: at(2024, 3, 14),
            status: RawPost::PUBLISHED.to_string(),
            title: rendered("Building a Headless Blog"),
            content: rendered(
                "<p>A headless CMS keeps content editing and presentation apart. \
                 The front end fetches posts over a REST API and renders them on the server.</p>\
                 <h2>Why headless</h2><p>Editors keep a familiar dashboard while the site stays fast.</p>",
            ),
            excerpt: rendered("<p>Separating content editing from presentation.</p>"),
            author: 1,
            featured_media: 0,
            categories: vec![1],
            tags: vec![1, 2],
            embedded: Some(sample_author()),
        },
        RawPost {
            id: 2,
            slug: "notes-on-rest-apis".to_string(),
            date: at(2024, 2, 20),
            modified: at(2024, 2, 20),
            status: RawPost::PUBLISHED.to_string(),
            title: rendered("Notes on REST APIs &amp; Caching"),
            content: rendered(
                "<p>Paginated collections expose their totals in response headers. \
                 Caching responses for a short revalidate window keeps pages fresh \
                 without hammering the origin.</p>",
            ),
            excerpt: rendered("<p>Pagination headers and short-lived caches.</p>"),
            author: 1,
            featured_media: 0,
            categories: vec![1],
            tags: vec![2],
            embedded: Some(sample_author()),
        },
        RawPost {
            id: 1,
            slug: "hello-world".to_string(),
            date: at(2024, 1, 5),
            modified: at(2024, 1, 5),
            status: RawPost::PUBLISHED.to_string(),
            title: rendered("Hello World"),
            content: rendered(
                "<p>Welcome to the blog. This is the first post, shown while the \
                 content source is not connected.</p>",
            ),
            excerpt: rendered(""),
            author: 1,
            featured_media: 0,
            categories: vec![2],
            tags: vec![],
            embedded: Some(sample_author()),
        },
    ]
}

fn term(id: u64, name: &str, slug: &str, count: u64) -> RawTerm {
    RawTerm {
        id,
        name: name.to_string(),
        slug: slug.to_string(),
        count,
        description: String::new(),
        parent: 0,
    }
}

fn sample_categories() -> Vec<RawTerm> {
    vec![term(1, "Engineering", "engineering", 2), term(2, "News", "news", 1)]
}

fn sample_tags() -> Vec<RawTerm> {
    vec![term(1, "CMS", "cms", 1), term(2, "Web", "web", 2)]
}
