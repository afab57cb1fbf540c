//! 两个页面的窄正则抓取。
//!
//! 目标页面的标记结构稳定且有限，这里只匹配已知子串，不引入通用 HTML 解析器；
//! 页面结构一旦变化，匹配会直接失效（返回空）。

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

static RE_DETAIL_LINK: OnceLock<Regex> = OnceLock::new();
static RE_GET_ANCHOR: OnceLock<Regex> = OnceLock::new();

fn re_detail_link() -> &'static Regex {
    RE_DETAIL_LINK.get_or_init(|| {
        Regex::new(r"book/index\.php\?md5=([a-fA-F0-9]{32})").expect("compile RE_DETAIL_LINK")
    })
}

fn re_get_anchor() -> &'static Regex {
    RE_GET_ANCHOR
        .get_or_init(|| Regex::new(r#"href="(https?://[^"]+)">GET</a>"#).expect("compile RE_GET_ANCHOR"))
}

/// 从搜索结果页提取书籍详情链接中的 md5，去重并保持首次出现的顺序。
pub fn extract_md5_ids(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    re_detail_link()
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// 从中转下载页提取文本恰为 `GET` 的锚点 href。
pub fn extract_get_link(html: &str) -> Option<String> {
    re_get_anchor()
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
