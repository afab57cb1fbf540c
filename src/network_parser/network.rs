//! HTTP 抓取工具。
//!
//! `Transport` 只负责发出单个 GET（不跟随重定向）；`Fetcher` 在其之上实现
//! 有界重定向跟随、文本读取以及流式落盘（失败时清理残留文件）。

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::ProgressBar;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderValue, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use thiserror::Error;
use tracing::debug;

use crate::base_system::file_cleaner::{IN_FLIGHT, remove_partial_file};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

const COPY_BUF_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }

    /// 读取响应体时的错误：blocking reqwest 会把超时包进 `io::Error`。
    fn from_body_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::TimedOut {
            return Self::Timeout;
        }
        if let Some(inner) = err.get_ref().and_then(|e| e.downcast_ref::<reqwest::Error>())
            && inner.is_timeout()
        {
            return Self::Timeout;
        }
        Self::Network(err.to_string())
    }

    fn too_many_redirects(limit: usize) -> Self {
        Self::Network(format!("too many redirects (limit {limit})"))
    }
}

/// 单跳响应：状态码、可选的 Location、可选的长度，以及尚未读取的响应体。
pub struct RawResponse {
    pub status: u16,
    pub location: Option<String>,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read>,
}

impl RawResponse {
    fn redirect_target(&self, current: &str) -> Option<String> {
        if !(300..400).contains(&self.status) {
            return None;
        }
        let location = self.location.as_deref()?.trim();
        if location.is_empty() {
            return None;
        }
        if Url::parse(location).is_ok() {
            return Some(location.to_string());
        }
        // 相对 Location 以当前 URL 为基准解析
        let resolved = Url::parse(current)
            .and_then(|base| base.join(location))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| location.to_string());
        Some(resolved)
    }
}

pub trait Transport {
    fn send(&self, url: &str) -> Result<RawResponse, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_TIMEOUT,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36".to_string(),
        }
    }
}

/// 基于 `reqwest::blocking` 的传输实现，关闭自动重定向以便上层计数。
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        // reqwest is built without a gzip decoder; ask for identity bodies.
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );

        let client = Client::builder()
            .default_headers(headers)
            .redirect(Policy::none())
            .timeout(config.request_timeout)
            .build()
            .map_err(FetchError::from_reqwest)?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, url: &str) -> Result<RawResponse, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(FetchError::from_reqwest)?;

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(RawResponse {
            status: resp.status().as_u16(),
            location,
            content_length: resp.content_length(),
            body: Box::new(resp),
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Clone, Copy)]
pub struct Fetcher<'a> {
    transport: &'a dyn Transport,
    max_redirects: usize,
}

impl<'a> Fetcher<'a> {
    pub fn new(transport: &'a dyn Transport, max_redirects: usize) -> Self {
        Self {
            transport,
            max_redirects,
        }
    }

    /// GET 并以文本返回最终（非重定向）响应。
    pub fn get_text(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let mut current = url.to_string();
        for _ in 0..=self.max_redirects {
            let mut resp = self.transport.send(&current)?;
            if let Some(next) = resp.redirect_target(&current) {
                debug!("redirect {} -> {}", current, next);
                current = next;
                continue;
            }

            let mut body = Vec::new();
            resp.body
                .read_to_end(&mut body)
                .map_err(FetchError::from_body_read)?;
            return Ok(HttpResponse {
                status: resp.status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Err(FetchError::too_many_redirects(self.max_redirects))
    }

    /// 将响应体流式写入 `dest`，返回写入字节数。
    ///
    /// 任何失败路径（重定向、非 200、传输错误、超时）都会先关闭并删除残留文件。
    pub fn download(&self, url: &str, dest: &Path, bar: &ProgressBar) -> Result<u64, FetchError> {
        let _tracked = IN_FLIGHT.track(dest);
        let mut current = url.to_string();
        for _ in 0..=self.max_redirects {
            let file = File::create(dest).map_err(|source| FetchError::Io {
                path: dest.to_path_buf(),
                source,
            })?;

            let resp = match self.transport.send(&current) {
                Ok(resp) => resp,
                Err(err) => {
                    drop(file);
                    remove_partial_file(dest);
                    return Err(err);
                }
            };

            if let Some(next) = resp.redirect_target(&current) {
                drop(file);
                remove_partial_file(dest);
                debug!("redirect {} -> {}", current, next);
                current = next;
                continue;
            }

            if resp.status != 200 {
                drop(file);
                remove_partial_file(dest);
                return Err(FetchError::Status(resp.status));
            }

            return match stream_body(resp, file, dest, bar) {
                Ok(written) => Ok(written),
                Err(err) => {
                    bar.abandon();
                    remove_partial_file(dest);
                    Err(err)
                }
            };
        }
        Err(FetchError::too_many_redirects(self.max_redirects))
    }
}

fn stream_body(
    mut resp: RawResponse,
    file: File,
    dest: &Path,
    bar: &ProgressBar,
) -> Result<u64, FetchError> {
    let io_err = |source: io::Error| FetchError::Io {
        path: dest.to_path_buf(),
        source,
    };

    if let Some(len) = resp.content_length {
        bar.set_length(len);
    }

    let mut writer = BufWriter::new(file);
    let mut buf = vec![0u8; COPY_BUF_BYTES];
    let mut written = 0u64;
    loop {
        let n = match resp.body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(FetchError::from_body_read(err)),
        };
        writer.write_all(&buf[..n]).map_err(io_err)?;
        written += n as u64;
        bar.inc(n as u64);
    }

    let file = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
    file.sync_all().map_err(io_err)?;
    bar.finish_and_clear();
    Ok(written)
}


#[cfg(test)]
mod tests {
    use super::stub::StubTransport;
    use super::*;

    #[test]
    fn follows_redirect_to_exact_location() {
        let transport = StubTransport::new()
            .redirect("http://a.test/start", 302, "http://b.test/final?x=1")
            .respond("http://b.test/final?x=1", 200, "hello");
        let fetcher = Fetcher::new(&transport, DEFAULT_MAX_REDIRECTS);

        let resp = fetcher.get_text("http://a.test/start").unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "hello");
        assert_eq!(
            transport.requests(),
            vec!["http://a.test/start", "http://b.test/final?x=1"]
        );
    }

    #[test]
    fn relative_location_resolves_against_current_url() {
        let transport = StubTransport::new()
            .redirect("http://a.test/dir/page", 301, "/other")
            .respond("http://a.test/other", 200, "ok");
        let fetcher = Fetcher::new(&transport, DEFAULT_MAX_REDIRECTS);

        assert_eq!(fetcher.get_text("http://a.test/dir/page").unwrap().body, "ok");
    }

    #[test]
    fn redirect_loop_is_bounded() {
        let transport = StubTransport::new()
            .redirect("http://a.test/x", 302, "http://a.test/y")
            .redirect("http://a.test/y", 302, "http://a.test/x");
        let fetcher = Fetcher::new(&transport, 3);

        let err = fetcher.get_text("http://a.test/x").unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
        assert_eq!(transport.requests().len(), 4);
    }

    #[test]
    fn non_200_status_is_returned_not_raised() {
        let transport = StubTransport::new().respond("http://a.test/", 404, "missing");
        let fetcher = Fetcher::new(&transport, DEFAULT_MAX_REDIRECTS);

        let resp = fetcher.get_text("http://a.test/").unwrap();
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn timeout_is_surfaced() {
        let transport = StubTransport::new().timeout("http://a.test/");
        let fetcher = Fetcher::new(&transport, DEFAULT_MAX_REDIRECTS);

        assert!(matches!(
            fetcher.get_text("http://a.test/"),
            Err(FetchError::Timeout)
        ));
    }

    #[test]
    fn download_writes_body_after_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("book.pdf");
        let transport = StubTransport::new()
            .redirect("http://a.test/get", 302, "http://cdn.test/file")
            .respond("http://cdn.test/file", 200, "%PDF-1.4 data");
        let fetcher = Fetcher::new(&transport, DEFAULT_MAX_REDIRECTS);

        let written = fetcher
            .download("http://a.test/get", &dest, &ProgressBar::hidden())
            .unwrap();
        assert_eq!(written, 13);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "%PDF-1.4 data");
    }

    #[test]
    fn download_non_200_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("book.pdf");
        let transport = StubTransport::new().respond("http://a.test/get", 503, "busy");
        let fetcher = Fetcher::new(&transport, DEFAULT_MAX_REDIRECTS);

        let err = fetcher
            .download("http://a.test/get", &dest, &ProgressBar::hidden())
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(503)));
        assert!(!dest.exists());
    }

    #[test]
    fn download_mid_body_failure_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("book.pdf");
        let transport = StubTransport::new().broken_body("http://a.test/get", vec![7u8; 1024]);
        let fetcher = Fetcher::new(&transport, DEFAULT_MAX_REDIRECTS);

        let err = fetcher
            .download("http://a.test/get", &dest, &ProgressBar::hidden())
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn download_transport_error_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("book.pdf");
        let transport = StubTransport::new().timeout("http://a.test/get");
        let fetcher = Fetcher::new(&transport, DEFAULT_MAX_REDIRECTS);

        let err = fetcher
            .download("http://a.test/get", &dest, &ProgressBar::hidden())
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout));
        assert!(!dest.exists());
    }

    /// 在发送请求时记录目标文件是否已登记为进行中。
    struct WatchingTransport<'a> {
        dest: &'a Path,
        seen_in_flight: std::cell::Cell<bool>,
    }

    impl Transport for WatchingTransport<'_> {
        fn send(&self, _url: &str) -> Result<RawResponse, FetchError> {
            self.seen_in_flight.set(IN_FLIGHT.contains(self.dest));
            Ok(RawResponse {
                status: 200,
                location: None,
                content_length: Some(4),
                body: Box::new(io::Cursor::new(b"epub".to_vec())),
            })
        }
    }

    #[test]
    fn download_registers_destination_until_finished() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("book.epub");
        let transport = WatchingTransport {
            dest: &dest,
            seen_in_flight: std::cell::Cell::new(false),
        };
        let fetcher = Fetcher::new(&transport, DEFAULT_MAX_REDIRECTS);

        fetcher
            .download("http://a.test/get", &dest, &ProgressBar::hidden())
            .unwrap();
        assert!(transport.seen_in_flight.get());
        assert!(!IN_FLIGHT.contains(&dest));
        assert!(dest.exists());
    }
}
