//! 下载主流程编排。
//!
//! 依次尝试镜像站直到某个返回非空结果，再依次尝试前 N 个候选（解析直链 + 流式下载），
//! 第一个成功即停止。每个镜像、每个候选每次运行只尝试一次，不做退避重试。

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::catalog::search_mirror;
use super::models::{BookRecord, Mirror, RunOutcome};
use super::progress::download_bar;
use super::resolver::resolve_download_link;
use crate::base_system::context::Config;
use crate::network_parser::network::{FetchError, Fetcher};

/// 编排所需的不可变设置；镜像列表与中转站点从这里注入，便于替换为测试替身。
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub mirrors: Vec<Mirror>,
    pub resolver_host: String,
    pub max_candidates: usize,
    pub output_dir: PathBuf,
    pub show_progress: bool,
}

impl SearchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mirrors: config.mirrors.clone(),
            resolver_host: config.resolver_host.clone(),
            max_candidates: config.max_candidates.max(1),
            output_dir: config.default_save_dir(),
            show_progress: config.show_progress,
        }
    }
}

pub struct BookDownloader<'a, W: Write> {
    fetcher: Fetcher<'a>,
    settings: &'a SearchSettings,
    out: W,
}

impl<'a, W: Write> BookDownloader<'a, W> {
    pub fn new(fetcher: Fetcher<'a>, settings: &'a SearchSettings, out: W) -> Self {
        Self {
            fetcher,
            settings,
            out,
        }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.out
    }

    pub fn run(&mut self, query: &str) -> Result<RunOutcome> {
        self.say(format_args!("Searching for: \"{query}\"...\n"));

        fs::create_dir_all(&self.settings.output_dir).with_context(|| {
            format!(
                "创建保存目录失败: {}",
                self.settings.output_dir.display()
            )
        })?;

        let results = self.search_mirrors(query);
        if results.is_empty() {
            info!("no results for \"{}\"", query);
            self.say(format_args!("\nNo results found."));
            return Ok(RunOutcome::NoResults);
        }

        let candidates = &results[..results.len().min(self.settings.max_candidates)];
        self.say(format_args!("\nFound {} result(s):\n", results.len()));
        for (idx, book) in candidates.iter().enumerate() {
            self.say(format_args!("{}", book.listing_line(idx + 1)));
        }

        self.say(format_args!("\nAttempting download...\n"));
        for book in candidates {
            self.say(format_args!("Trying: \"{}\"...", book.title_or_unknown()));
            match self.try_candidate(book) {
                Ok(Some(path)) => {
                    info!("saved {}", path.display());
                    self.say(format_args!("\nSuccess! Saved to: {}", path.display()));
                    return Ok(RunOutcome::Saved(path));
                }
                Ok(None) => {
                    debug!("no download link for {:?}", book.md5);
                    self.say(format_args!("  No download link found, trying next..."));
                }
                Err(err) => {
                    info!("candidate {:?} failed: {}", book.md5, err);
                    self.say(format_args!("  Failed: {err}, trying next..."));
                }
            }
        }

        self.say(format_args!("\nCould not download any result."));
        Ok(RunOutcome::AllFailed)
    }

    /// 第一个返回非空结果的镜像胜出；失败的镜像只记录并跳过。
    fn search_mirrors(&mut self, query: &str) -> Vec<BookRecord> {
        let settings = self.settings;
        for mirror in &settings.mirrors {
            self.say(format_args!("Searching {}...", mirror.host));
            match search_mirror(&self.fetcher, mirror, query) {
                Ok(records) if !records.is_empty() => {
                    info!("{} returned {} record(s)", mirror.host, records.len());
                    return records;
                }
                Ok(_) => debug!("{} returned no records", mirror.host),
                Err(err) => {
                    info!("{} failed: {}", mirror.host, err);
                    self.say(format_args!("  {} failed: {}", mirror.host, err));
                }
            }
        }
        Vec::new()
    }

    fn try_candidate(&mut self, book: &BookRecord) -> Result<Option<PathBuf>, FetchError> {
        let Some(md5) = book.content_hash() else {
            debug!("record id={:?} has no content hash", book.id);
            return Ok(None);
        };
        let settings = self.settings;
        let Some(url) = resolve_download_link(&self.fetcher, &settings.resolver_host, md5)? else {
            return Ok(None);
        };

        let path = settings.output_dir.join(book.file_name());
        self.say(format_args!("  Downloading..."));
        debug!("download {} -> {}", url, path.display());

        let bar = download_bar(settings.show_progress);
        let written = self.fetcher.download(&url, &path, &bar)?;
        debug!("wrote {} bytes", written);
        Ok(Some(path))
    }

    // 控制台写失败（如管道关闭）不应中断下载
    fn say(&mut self, line: fmt::Arguments<'_>) {
        let _ = writeln!(self.out, "{line}");
    }
}
