//! 目录镜像站搜索：HTML 搜索页提取 md5，再批量查询 JSON 元数据接口。

use thiserror::Error;
use tracing::debug;

use super::models::{BookRecord, Mirror};
use crate::network_parser::network::{FetchError, Fetcher};
use crate::network_parser::page_parser::extract_md5_ids;

pub const SEARCH_RESULT_LIMIT: usize = 25;
pub const METADATA_FIELDS: &str = "id,title,author,extension,md5,filesize";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("HTTP {0}")]
    SearchStatus(u16),
    #[error("API HTTP {0}")]
    ApiStatus(u16),
    #[error("invalid metadata JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

pub fn search_url(mirror: &Mirror, query: &str) -> String {
    format!(
        "{}/search.php?req={}&res={}&view=simple&phrase=1&column=def",
        mirror.base_url(),
        urlencoding::encode(query),
        SEARCH_RESULT_LIMIT
    )
}

/// `ids` 保持逗号不转义。
pub fn metadata_url(mirror: &Mirror, ids: &[String]) -> String {
    format!(
        "{}/json.php?ids={}&fields={}",
        mirror.base_url(),
        ids.join(","),
        METADATA_FIELDS
    )
}

pub fn search_mirror(
    fetcher: &Fetcher<'_>,
    mirror: &Mirror,
    query: &str,
) -> Result<Vec<BookRecord>, CatalogError> {
    let url = search_url(mirror, query);
    debug!("search {}", url);
    let page = fetcher.get_text(&url)?;
    if page.status != 200 {
        return Err(CatalogError::SearchStatus(page.status));
    }

    let ids = extract_md5_ids(&page.body);
    debug!("{} matched {} id(s)", mirror.host, ids.len());
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let api = fetcher.get_text(&metadata_url(mirror, &ids))?;
    if api.status != 200 {
        return Err(CatalogError::ApiStatus(api.status));
    }

    Ok(serde_json::from_str(&api.body)?)
}
