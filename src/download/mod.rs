//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`      — 数据模型（Mirror / BookRecord / RunOutcome）
//! - `catalog`     — 目录镜像站搜索 + JSON 元数据查询
//! - `resolver`    — md5 -> 直链解析（固定中转站点）
//! - `progress`    — 单文件下载进度条
//! - `downloader`  — 镜像/候选回退的主流程编排

pub mod catalog;
pub mod downloader;
pub mod models;
pub(crate) mod progress;
pub mod resolver;
