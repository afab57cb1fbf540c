//! 下载残留文件清理。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

/// 尽力删除未完成的下载文件；删除失败只记录 debug 日志。
pub fn remove_partial_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("removed partial file {}", path.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => debug!("failed to remove partial file {}: {}", path.display(), err),
    }
}

/// 正在写入的下载文件登记表；Ctrl-C 退出前据此删除残留文件。
pub static IN_FLIGHT: PartialFiles = PartialFiles::new();

pub struct PartialFiles {
    paths: Mutex<Vec<PathBuf>>,
}

impl PartialFiles {
    pub const fn new() -> Self {
        Self {
            paths: Mutex::new(Vec::new()),
        }
    }

    /// 登记路径，guard 释放时自动注销（下载成功或已自行清理）。
    pub fn track(&self, path: &Path) -> PartialFileGuard<'_> {
        if let Ok(mut paths) = self.paths.lock() {
            paths.push(path.to_path_buf());
        }
        PartialFileGuard {
            owner: self,
            path: path.to_path_buf(),
        }
    }

    /// 删除所有仍在登记中的文件，返回处理的条目数。
    pub fn remove_all(&self) -> usize {
        let drained: Vec<PathBuf> = match self.paths.lock() {
            Ok(mut paths) => paths.drain(..).collect(),
            Err(_) => return 0,
        };
        for path in &drained {
            remove_partial_file(path);
        }
        drained.len()
    }

    #[cfg(test)]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths
            .lock()
            .map(|paths| paths.iter().any(|p| p == path))
            .unwrap_or(false)
    }
}

pub struct PartialFileGuard<'a> {
    owner: &'a PartialFiles,
    path: PathBuf,
}

impl Drop for PartialFileGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut paths) = self.owner.paths.lock()
            && let Some(pos) = paths.iter().position(|p| p == &self.path)
        {
            paths.swap_remove(pos);
        }
    }
}

pub fn is_empty_dir(path: impl AsRef<Path>) -> io::Result<bool> {
    let mut entries = fs::read_dir(path.as_ref())?;
    Ok(entries.next().is_none())
}
