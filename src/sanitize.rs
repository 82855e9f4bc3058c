use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, LazyLock},
};

use regex::Regex;

use crate::config::SanitizerEngine;

/// 允许保留的标签
pub const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "dl", "dt", "dd",
    "blockquote", "pre", "code", "table", "thead", "tbody", "tfoot", "tr", "th", "td", "caption",
    "figure", "figcaption", "div", "span", "a", "img", "strong", "b", "em", "i", "u", "s", "del",
    "ins", "sub", "sup", "small", "mark",
];

/// 允许保留的属性，对所有标签生效
pub const ALLOWED_ATTRIBUTES: &[&str] =
    &["href", "src", "alt", "title", "class", "id", "target", "rel"];

/// 这些标签连同内容一起删除，不能出现在允许列表中
const CLEAN_CONTENT_TAGS: &[&str] = &["script", "style"];

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<script\b[^>]*>")
        .expect("invalid script regex")
});

static EVENT_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).expect("invalid event regex")
});

static JS_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript\s*:").expect("invalid uri regex"));

/// CMS HTML 清理器
///
/// 默认使用 ammonia 按允许列表过滤标签和属性，丢弃 `data-*`、事件属性、
/// `javascript:` 链接以及 script/style 的内容。
///
/// 当配置为 [`SanitizerEngine::Basic`] 或允许列表无法构建 ammonia 时，
/// 退化为正则实现，只移除 `<script>`、`on*=` 属性和 `javascript:`。
/// 该实现不过滤其它标签和属性，不能视为完整替代。
#[derive(Clone)]
pub struct HtmlSanitizer {
    engine: Engine,
}

#[derive(Clone)]
enum Engine {
    Ammonia(Arc<ammonia::Builder<'static>>),
    Basic,
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new(SanitizerEngine::Ammonia)
    }
}

impl HtmlSanitizer {
    pub fn new(engine: SanitizerEngine) -> Self {
        match engine {
            SanitizerEngine::Ammonia => Self::with_allow_list(ALLOWED_TAGS, ALLOWED_ATTRIBUTES),
            SanitizerEngine::Basic => Self {
                engine: Engine::Basic,
            },
        }
    }

    /// 使用自定义允许列表构建，列表非法时退化为正则实现
    pub fn with_allow_list(tags: &[&'static str], attributes: &[&'static str]) -> Self {
        match build_ammonia(tags, attributes) {
            Ok(builder) => Self {
                engine: Engine::Ammonia(Arc::new(builder)),
            },
            Err(reason) => {
                tracing::warn!(%reason, "cannot build html sanitizer, using basic fallback");
                Self {
                    engine: Engine::Basic,
                }
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.engine, Engine::Basic)
    }

    pub fn sanitize(&self, html: &str) -> String {
        match &self.engine {
            Engine::Ammonia(builder) => builder.clean(html).to_string(),
            Engine::Basic => basic_sanitize(html),
        }
    }
}

fn build_ammonia(
    tags: &[&'static str],
    attributes: &[&'static str],
) -> Result<ammonia::Builder<'static>, String> {
    if tags.is_empty() {
        return Err("empty tag allow-list".to_string());
    }
    if let Some(tag) = tags
        .iter()
        .find(|tag| CLEAN_CONTENT_TAGS.contains(&tag.to_ascii_lowercase().as_str()))
    {
        return Err(format!("`{tag}` cannot be allowed"));
    }
    if let Some(attr) = attributes
        .iter()
        .find(|attr| attr.to_ascii_lowercase().starts_with("on"))
    {
        return Err(format!("event handler `{attr}` cannot be allowed"));
    }

    let mut builder = ammonia::Builder::default();
    builder
        .tags(tags.iter().copied().collect::<HashSet<_>>())
        .clean_content_tags(CLEAN_CONTENT_TAGS.iter().copied().collect::<HashSet<_>>())
        .tag_attributes(HashMap::new())
        .generic_attributes(attributes.iter().copied().collect::<HashSet<_>>())
        .generic_attribute_prefixes(HashSet::new())
        // rel 由允许列表控制，ammonia 不能再自动追加
        .link_rel(None);
    Ok(builder)
}

fn basic_sanitize(html: &str) -> String {
    let html = SCRIPT_BLOCK.replace_all(html, "");
    let html = EVENT_ATTR.replace_all(&html, "");
    JS_URI.replace_all(&html, "").into_owned()
}
