//! 帧提取服务层
//!
//! 缩略图缓存只通过 [`FrameExtractor`] 依赖帧提取能力：
//! - 生产环境使用 [`FFmpegExtractor`]，调用 ffmpeg 抽取单帧并从标准输出读取 JPEG
//! - 测试中可以注入任意实现

use log::{debug, warn};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// 帧提取能力：给定源文件和时间偏移，返回一张静态图像的字节
pub trait FrameExtractor: Send + Sync {
    fn extract_frame(&self, source: &Path, offset_secs: f32) -> Result<Vec<u8>>;
}

/// FFmpeg 服务配置
#[derive(Debug, Clone)]
pub struct FFmpegConfig {
    /// ffmpeg 可执行文件
    pub binary: String,
    /// 缩略图质量 (1-31, 越小越好)
    pub thumbnail_quality: u8,
    /// 缩略图宽度
    pub thumbnail_width: u32,
}

impl Default for FFmpegConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            thumbnail_quality: 2,
            thumbnail_width: 320,
        }
    }
}

/// 基于 ffmpeg 子进程的帧提取
pub struct FFmpegExtractor {
    config: FFmpegConfig,
}

impl FFmpegExtractor {
    pub fn new(config: FFmpegConfig) -> Self {
        Self { config }
    }

    fn build_args(&self, source: &Path, offset_secs: f32) -> Vec<String> {
        let quality = self.config.thumbnail_quality.clamp(1, 31);
        vec![
            "-v".into(),
            "error".into(),
            "-ss".into(),
            format!("{:.2}", offset_secs),
            "-i".into(),
            source.to_string_lossy().to_string(),
            "-frames:v".into(),
            "1".into(),
            "-vf".into(),
            format!("scale={}:-1", self.config.thumbnail_width),
            "-q:v".into(),
            quality.to_string(),
            "-f".into(),
            "image2pipe".into(),
            "-vcodec".into(),
            "mjpeg".into(),
            "pipe:1".into(),
        ]
    }
}

impl FrameExtractor for FFmpegExtractor {
    fn extract_frame(&self, source: &Path, offset_secs: f32) -> Result<Vec<u8>> {
        let output = Command::new(&self.config.binary)
            .args(self.build_args(source, offset_secs))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::Generation(format!("FFmpeg 执行错误: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("缩略图生成失败: {:?} ({})", source, stderr.trim());
            return Err(Error::Generation(format!(
                "ffmpeg exited with {} for {}",
                output.status,
                source.display()
            )));
        }

        if output.stdout.is_empty() {
            return Err(Error::Generation(format!(
                "ffmpeg produced no frame for {}",
                source.display()
            )));
        }

        debug!("抽帧成功: {:?} ({} bytes)", source, output.stdout.len());
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_seek_before_input() {
        let extractor = FFmpegExtractor::new(FFmpegConfig {
            thumbnail_quality: 0,
            ..FFmpegConfig::default()
        });
        let args = extractor.build_args(Path::new("clips/a.mp4"), 1.0);

        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input);
        assert_eq!(args[ss + 1], "1.00");
        assert_eq!(args[input + 1], "clips/a.mp4");
        // 质量被限制在 1..=31
        let q = args.iter().position(|a| a == "-q:v").unwrap();
        assert_eq!(args[q + 1], "1");
        assert_eq!(args.last().unwrap(), "pipe:1");
    }

    #[test]
    fn test_missing_binary_is_generation_error() {
        let extractor = FFmpegExtractor::new(FFmpegConfig {
            binary: "definitely-not-an-ffmpeg-binary".to_string(),
            ..FFmpegConfig::default()
        });
        let err = extractor
            .extract_frame(Path::new("a.mp4"), 1.0)
            .unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }
}
