//! md5 -> 直链解析。
//!
//! 中转站点固定（默认 `library.lol`，明文 HTTP），与命中的目录镜像无关。

use tracing::debug;

use crate::network_parser::network::{FetchError, Fetcher};
use crate::network_parser::page_parser::extract_get_link;

pub const DEFAULT_RESOLVER_HOST: &str = "library.lol";

pub fn resolver_page_url(host: &str, md5: &str) -> String {
    format!("http://{host}/main/{md5}")
}

/// 返回 `Ok(None)` 表示「换下一个候选」：页面非 200 或没有 GET 链接。
pub fn resolve_download_link(
    fetcher: &Fetcher<'_>,
    host: &str,
    md5: &str,
) -> Result<Option<String>, FetchError> {
    let page = fetcher.get_text(&resolver_page_url(host, md5))?;
    if page.status != 200 {
        debug!("resolver page for {} returned HTTP {}", md5, page.status);
        return Ok(None);
    }
    Ok(extract_get_link(&page.body))
}
