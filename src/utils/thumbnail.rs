use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// 缩略图文件扩展名
pub const THUMBNAIL_EXTENSION: &str = "jpg";

const MAX_STEM_LEN: usize = 48;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("static regex"));

/// 修改时间转换为自纪元以来的纳秒；早于纪元的时间按 0 处理
pub fn mtime_nanos(mtime: SystemTime) -> u128 {
    mtime
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

/// 由 (源路径, 修改时间) 计算缓存键（SHA-256 十六进制）
pub fn cache_key(source: &Path, mtime: SystemTime) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    hasher.update(mtime_nanos(mtime).to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 助手：缩略图文件名 `<stem>-<key 前 16 位>.jpg`
pub fn thumbnail_file_name(source: &Path, mtime: SystemTime) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut stem = UNSAFE_CHARS.replace_all(&stem, "_").to_string();
    if stem.len() > MAX_STEM_LEN {
        // 替换后只剩 ASCII，按字节截断是安全的
        stem.truncate(MAX_STEM_LEN);
    }
    if stem.is_empty() {
        stem.push_str("video");
    }

    let key = cache_key(source, mtime);
    format!("{}-{}.{}", stem, &key[..16], THUMBNAIL_EXTENSION)
}
