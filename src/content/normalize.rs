//! CMS 数据归一化
//!
//! 这里的函数都是纯函数：不做 IO，不持有状态。实体解码在每个字段上只做一次，
//! 对已解码文本再次解码会把字面量 `&amp;` 之类的内容错误地还原。

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::model::{Author, Page, Post, RawAuthor, RawPage, RawPost, RawTerm, Term, TextField};

/// 每分钟阅读字数
pub const WORDS_PER_MINUTE: usize = 200;

/// 截断摘要时追加的省略标记
pub const ELLIPSIS: &str = "...";

/// 列表页摘要的默认长度（字符数）
pub const EXCERPT_LENGTH: usize = 160;

/// 特色图片默认尺寸
pub const IMAGE_SIZE: &str = "large";

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});")
        .expect("invalid entity regex")
});

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>")
        .expect("invalid script regex")
});

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("invalid comment regex"));

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("invalid tag regex"));

/// 解码 HTML 字符实体
///
/// 支持 HTML5 命名实体、十进制和十六进制引用，无法识别的实体原样保留。
pub fn decode_html_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    ENTITY.replace_all(s, |caps: &Captures| {
        let whole = &caps[0];
        let name = &caps[1];
        let decoded = match name.strip_prefix('#') {
            Some(num) => {
                let code = match num.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num.parse::<u32>().ok(),
                };
                code.map(numeric_reference).map(String::from)
            }
            None => quick_xml::escape::resolve_html5_entity(name).map(str::to_string),
        };
        decoded.unwrap_or_else(|| whole.to_string())
    })
}

/// 数字引用对应的字符
///
/// 0、代理区、超出范围以及除空白外的 C0/C1 控制字符按 HTML5 解析规则替换为 U+FFFD。
fn numeric_reference(code: u32) -> char {
    match char::from_u32(code) {
        Some(c) if c.is_control() && !c.is_ascii_whitespace() => char::REPLACEMENT_CHARACTER,
        Some(c) => c,
        None => char::REPLACEMENT_CHARACTER,
    }
}

/// 去除所有标签并解码实体，得到纯文本
///
/// 标签替换为空格后再合并空白，`<script>`/`<style>` 的内容一并丢弃。
/// 结果用于摘要和字数统计，不能当作安全的 HTML 输出。
pub fn strip_html(html: &str) -> String {
    let without_blocks = SCRIPT_OR_STYLE.replace_all(html, " ");
    let without_comments = COMMENT.replace_all(&without_blocks, " ");
    let text = TAG.replace_all(&without_comments, " ");
    let decoded = decode_html_entities(&text);

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 生成纯文本摘要，超过 `max_len` 个字符时截断并追加 [`ELLIPSIS`]
pub fn generate_excerpt(html: &str, max_len: usize) -> String {
    let text = strip_html(html);

    match text.char_indices().nth(max_len) {
        None => text,
        Some((cut, _)) => {
            let mut excerpt = text[..cut].trim_end().to_string();
            excerpt.push_str(ELLIPSIS);
            excerpt
        }
    }
}

/// 估算阅读时间（分钟），至少为 1
pub fn calculate_reading_time(html: &str) -> u32 {
    let words = strip_html(html).split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// 解析特色图片地址
///
/// 优先返回指定尺寸，其次原图，没有嵌入媒体时返回 `None`。
pub fn featured_image_url(post: &RawPost, size: &str) -> Option<String> {
    let media = post.embedded.as_ref()?.featured_media.first()?;

    media
        .media_details
        .as_ref()
        .and_then(|details| details.sizes.get(size))
        .map(|variant| variant.source_url.clone())
        .or_else(|| media.source_url.clone())
}

/// 取第一个嵌入的作者
pub fn author_info(post: &RawPost) -> Option<Author> {
    post.embedded
        .as_ref()?
        .author
        .first()
        .filter(|author| author.is_resolved())
        .map(|author| Author {
            id: author.id,
            name: decode_html_entities(&author.name).into_owned(),
            avatar_url: largest_avatar(author),
        })
}

fn largest_avatar(author: &RawAuthor) -> Option<String> {
    author
        .avatar_urls
        .iter()
        .max_by_key(|(size, _)| size.parse::<u32>().unwrap_or(0))
        .map(|(_, url)| url.clone())
}

fn text_field(raw: String) -> TextField {
    let text = decode_html_entities(&raw).into_owned();
    TextField { raw, text }
}

/// 归一化文章
///
/// 摘要为空时从正文生成。
pub fn normalize_post(raw: RawPost) -> Post {
    let featured_image = featured_image_url(&raw, IMAGE_SIZE);
    let author = author_info(&raw);
    let reading_time = calculate_reading_time(&raw.content.rendered);

    let excerpt_source = if strip_html(&raw.excerpt.rendered).is_empty() {
        &raw.content.rendered
    } else {
        &raw.excerpt.rendered
    };
    let excerpt = TextField {
        text: generate_excerpt(excerpt_source, EXCERPT_LENGTH),
        raw: raw.excerpt.rendered.clone(),
    };

    Post {
        id: raw.id,
        slug: decode_html_entities(&raw.slug).into_owned(),
        published_at: raw.date,
        modified_at: raw.modified,
        title: text_field(raw.title.rendered),
        content: text_field(raw.content.rendered),
        excerpt,
        categories: raw.categories,
        tags: raw.tags,
        author_id: raw.author,
        featured_media_id: (raw.featured_media != 0).then_some(raw.featured_media),
        featured_image,
        author,
        reading_time,
    }
}

pub fn normalize_page(raw: RawPage) -> Page {
    Page {
        id: raw.id,
        slug: raw.slug,
        modified_at: raw.modified,
        title: text_field(raw.title.rendered),
        content: raw.content.rendered,
    }
}

/// 归一化分类或标签，名称和 slug 做实体解码
pub fn normalize_term(raw: RawTerm) -> Term {
    Term {
        id: raw.id,
        name: decode_html_entities(&raw.name).into_owned(),
        slug: decode_html_entities(&raw.slug).into_owned(),
        count: raw.count,
        description: strip_html(&raw.description),
        parent: (raw.parent != 0).then_some(raw.parent),
    }
}
