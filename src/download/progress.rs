//! 单文件下载进度条。

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub(crate) fn download_bar(enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    // 长度未知时由 Content-Length 补上；缺失则 {total_bytes} 显示为 0
    let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template(
        "  [{elapsed_precise}] {wide_bar} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("##-");
    bar.set_style(style);
    bar
}
