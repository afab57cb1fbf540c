//! 按书名从目录镜像站搜索电子书并下载第一个可用结果。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/文件名清洗/残留文件清理等基础设施
//! - `network_parser`：HTTP 抓取（有界重定向、流式落盘）与页面正则解析
//! - `download`：目录搜索、直链解析与镜像/候选回退编排

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::io;
use std::path::Path;

mod base_system;
mod download;
mod network_parser;

use base_system::config::load_or_create_with_base;
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use download::downloader::{BookDownloader, SearchSettings};
use download::models::RunOutcome;
use network_parser::network::{Fetcher, HttpTransport};
use tracing::{debug, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const USAGE: &str = "Usage: download-book --name <book_name>";

#[derive(Debug, Parser)]
#[command(name = "download-book")]
#[command(about = "Search catalog mirrors for a book by title and download the first working result")]
struct Cli {
    /// 要搜索的书名（按整句匹配）
    #[arg(long, num_args = 0..=1)]
    name: Option<String>,

    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 数据目录路径（用于存放 config.yml 和 logs）
    #[arg(long)]
    data_dir: Option<String>,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("download-book v{}", VERSION);
        return Ok(());
    }

    let Some(book_name) = book_name(&cli) else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };

    let data_dir = cli.data_dir.as_deref().map(Path::new);
    let log = init_logging(cli.debug, data_dir)?;
    debug!("logging to {}", log.logs_dir().display());

    let config = load_or_create_with_base::<Config>(data_dir).context("加载配置失败")?;
    let transport = HttpTransport::new(&config.http_config()).context("初始化 HTTP 客户端失败")?;
    let fetcher = Fetcher::new(&transport, config.max_redirects);
    let settings = SearchSettings::from_config(&config);
    info!(target: "startup", "v{} searching \"{}\" into {}", VERSION, book_name, settings.output_dir.display());

    let stdout = io::stdout();
    let outcome = BookDownloader::new(fetcher, &settings, stdout.lock()).run(book_name)?;
    match &outcome {
        RunOutcome::Saved(path) => info!(target: "startup", "finished: {}", path.display()),
        other => info!(target: "startup", "finished: {:?}", other),
    }
    Ok(())
}

/// `--name` 缺失、无值或为空串时返回 `None`（打印用法并以 1 退出）。
fn book_name(cli: &Cli) -> Option<&str> {
    cli.name.as_deref().filter(|n| !n.is_empty())
}

fn init_logging(debug: bool, base_dir: Option<&Path>) -> Result<LogSystem> {
    LogSystem::init_with_base(LogOptions { debug }, base_dir).map_err(|e| anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed_name(args: &[&str]) -> Option<String> {
        let cli = Cli::try_parse_from(args).unwrap();
        book_name(&cli).map(str::to_string)
    }

    #[test]
    fn missing_or_empty_name_is_a_usage_error() {
        assert_eq!(parsed_name(&["download-book"]), None);
        assert_eq!(parsed_name(&["download-book", "--name"]), None);
        assert_eq!(parsed_name(&["download-book", "--name", ""]), None);
    }

    #[test]
    fn given_name_is_used_verbatim() {
        assert_eq!(
            parsed_name(&["download-book", "--name", "Dune"]).as_deref(),
            Some("Dune")
        );
        assert_eq!(
            parsed_name(&["download-book", "--name", "The Left Hand of Darkness"]).as_deref(),
            Some("The Left Hand of Darkness")
        );
    }
}
