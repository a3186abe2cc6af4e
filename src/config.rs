//! 运行配置
//!
//! 从环境变量读取（启动时先加载 `.env`，文件不存在不算错误）。
//! 读取时日志尚未初始化，问题先记在 [`AppConfig::warnings`]，由 [`AppConfig::log_warnings`] 输出。

use log::warn;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::services::FFmpegConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 目录数据库文件
    pub db_path: PathBuf,
    /// 缩略图缓存目录
    pub thumbnail_dir: PathBuf,
    /// 同时运行的缩略图生成任务数
    pub thumbnail_workers: usize,
    /// 获取缩略图时的最长等待
    pub thumbnail_wait: Duration,
    pub ffmpeg: FFmpegConfig,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    /// 加载过程中发现的问题
    pub warnings: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("videos.db"),
            thumbnail_dir: PathBuf::from("thumbnails"),
            thumbnail_workers: num_cpus::get(),
            thumbnail_wait: Duration::from_millis(3000),
            ffmpeg: FFmpegConfig::default(),
            log_level: "info".to_string(),
            log_file: None,
            warnings: Vec::new(),
        }
    }
}

impl AppConfig {
    /// 加载 `.env` 后读取环境变量
    pub fn from_env() -> Self {
        let dotenv_error = dotenvy::dotenv().err().filter(|e| !e.not_found());
        let mut config = Self::from_lookup(|key| std::env::var(key).ok());
        if let Some(e) = dotenv_error {
            config.warnings.insert(0, format!(".env 加载失败: {}", e));
        }
        config
    }

    /// 日志初始化后输出加载时的问题
    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            warn!("{}", warning);
        }
    }

    /// 从任意键值来源构建，未设置的键使用默认值
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut warnings = Vec::new();
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let quality = defaults.ffmpeg.thumbnail_quality;
        let width = defaults.ffmpeg.thumbnail_width;
        let ffmpeg = FFmpegConfig {
            binary: text("FFMPEG_BIN").unwrap_or(defaults.ffmpeg.binary),
            thumbnail_quality: parse_or(&lookup, &mut warnings, "THUMBNAIL_QUALITY", quality)
                .clamp(1, 31),
            thumbnail_width: parse_or(&lookup, &mut warnings, "THUMBNAIL_WIDTH", width),
        };
        let workers = parse_or(
            &lookup,
            &mut warnings,
            "THUMBNAIL_WORKERS",
            defaults.thumbnail_workers,
        );

        Self {
            db_path: text("CATALOG_DB").map(PathBuf::from).unwrap_or(defaults.db_path),
            thumbnail_dir: text("THUMBNAIL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.thumbnail_dir),
            thumbnail_workers: workers.max(1),
            thumbnail_wait: Duration::from_millis(parse_or(
                &lookup,
                &mut warnings,
                "THUMBNAIL_WAIT_MS",
                defaults.thumbnail_wait.as_millis() as u64,
            )),
            ffmpeg,
            log_level: text("CATALOG_LOG_LEVEL").unwrap_or(defaults.log_level),
            log_file: text("CATALOG_LOG_FILE").map(PathBuf::from),
            warnings,
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(
    lookup: &impl Fn(&str) -> Option<String>,
    warnings: &mut Vec<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().unwrap_or_else(|_| {
            warnings.push(format!("{}={} 无法解析，使用默认值 {}", key, raw, default));
            default
        }),
        _ => default,
    }
}
