//! 下载相关的数据模型定义。
//!
//! 包含镜像站、目录返回的书籍记录以及一次运行的最终结果。

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::base_system::context::sanitize_filename;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    pub host: String,
    #[serde(default)]
    pub https: bool,
}

impl Mirror {
    pub fn new(host: &str, https: bool) -> Self {
        Self {
            host: host.to_string(),
            https,
        }
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        format!("{}://{}", scheme, self.host)
    }
}

/// 目录 JSON 接口返回的一条记录。
///
/// 接口把数字字段也编码成字符串，且任何字段都可能缺失，因此全部按宽松规则解析。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub extension: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub md5: Option<String>,
    #[serde(default, deserialize_with = "lenient_size")]
    pub filesize: Option<u64>,
}

impl BookRecord {
    pub fn title_or_unknown(&self) -> &str {
        non_empty(&self.title).unwrap_or("Unknown")
    }

    pub fn author_or_unknown(&self) -> &str {
        non_empty(&self.author).unwrap_or("Unknown")
    }

    pub fn extension_or_default(&self) -> &str {
        non_empty(&self.extension).unwrap_or("pdf")
    }

    pub fn content_hash(&self) -> Option<&str> {
        non_empty(&self.md5)
    }

    /// 以 MB 展示文件大小（保留一位小数），未知时为 `?`。
    pub fn human_size(&self) -> String {
        match self.filesize {
            Some(bytes) if bytes > 0 => format!("{:.1}MB", bytes as f64 / 1024.0 / 1024.0),
            _ => "?".to_string(),
        }
    }

    pub fn listing_line(&self, index: usize) -> String {
        format!(
            "{}. \"{}\" by {} [{}, {}]",
            index,
            self.title_or_unknown(),
            self.author_or_unknown(),
            self.extension.as_deref().unwrap_or("?"),
            self.human_size()
        )
    }

    /// `<标题> - <作者>.<扩展名>` 经清洗后的保存文件名。
    pub fn file_name(&self) -> String {
        sanitize_filename(&format!(
            "{} - {}.{}",
            self.title_or_unknown(),
            self.author_or_unknown(),
            self.extension_or_default()
        ))
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// 保存成功的完整路径
    Saved(PathBuf),
    NoResults,
    AllFailed,
}
