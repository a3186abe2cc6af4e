/// 辅助函数：格式化文件大小
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", (bytes as f64) / (GB as f64))
    } else if bytes >= MB {
        format!("{:.2} MB", (bytes as f64) / (MB as f64))
    } else if bytes >= KB {
        format!("{:.2} KB", (bytes as f64) / (KB as f64))
    } else {
        format!("{} B", bytes)
    }
}

/// 辅助函数：检查扩展名是否为支持的视频格式
pub fn is_video_extension(extension: &str) -> bool {
    ["mp4", "avi", "mov", "mkv"]
        .iter()
        .any(|ext| extension.eq_ignore_ascii_case(ext))
}
