//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息，以及输出文件名的清洗规则。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};
use crate::download::models::Mirror;
use crate::network_parser::network::HttpConfig;

pub const BOOKS_DIR_NAME: &str = "books";
pub const MAX_FILENAME_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 目录站点
    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<Mirror>,
    #[serde(default = "default_resolver_host")]
    pub resolver_host: String,

    // 网络配置
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // 下载配置
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default)]
    pub save_path: String,
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mirrors: default_mirrors(),
            resolver_host: default_resolver_host(),
            request_timeout: default_request_timeout(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            max_candidates: default_max_candidates(),
            save_path: String::new(),
            show_progress: default_true(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 8] = [
            FieldMeta {
                name: "mirrors",
                description: "目录镜像站列表，按顺序尝试（host / https）",
            },
            FieldMeta {
                name: "resolver_host",
                description: "解析直链的中转站点（固定，不随镜像变化）",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒）",
            },
            FieldMeta {
                name: "max_redirects",
                description: "单次请求最多跟随的重定向次数",
            },
            FieldMeta {
                name: "user_agent",
                description: "请求使用的 User-Agent",
            },
            FieldMeta {
                name: "max_candidates",
                description: "展示并尝试下载的候选结果数量",
            },
            FieldMeta {
                name: "save_path",
                description: "保存目录（留空则为程序所在目录下的 books）",
            },
            FieldMeta {
                name: "show_progress",
                description: "下载时是否显示进度条",
            },
        ];
        &FIELDS
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        if !self.save_path.trim().is_empty() {
            return PathBuf::from(&self.save_path);
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(BOOKS_DIR_NAME)
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            request_timeout: Duration::from_secs(self.request_timeout.max(1)),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// 将路径敏感字符 `/ \ ? % * : | " < >` 替换为 `-`，并截断到 200 个字符。
///
/// 不保证唯一：截断后前缀相同的两个文件名会互相覆盖。
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            '/' | '\\' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>' => '-',
            _ => ch,
        })
        .take(MAX_FILENAME_CHARS)
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_mirrors() -> Vec<Mirror> {
    ["libgen.lc", "libgen.is", "libgen.rs"]
        .into_iter()
        .map(|host| Mirror::new(host, false))
        .collect()
}

fn default_resolver_host() -> String {
    crate::download::resolver::DEFAULT_RESOLVER_HOST.to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_redirects() -> usize {
    crate::network_parser::network::DEFAULT_MAX_REDIRECTS
}

fn default_user_agent() -> String {
    HttpConfig::default().user_agent
}

fn default_max_candidates() -> usize {
    5
}
