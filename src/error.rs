//! 错误类型
//!
//! 目录、收藏、分类查询与缩略图缓存共用一套错误分类，
//! 每个操作要么返回值，要么返回下列错误之一。

use std::path::PathBuf;
use thiserror::Error;

/// 核心错误类型
///
/// 实现了 `Clone`，同一次缩略图生成的失败可以交给所有等待者。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// 唯一性冲突：重复的文件路径或重复的收藏
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// 引用的 id 或路径不存在
    #[error("not found: {0}")]
    NotFound(String),

    /// 缩略图源文件不存在
    #[error("thumbnail source missing: {}", .0.display())]
    SourceMissing(PathBuf),

    /// 帧提取失败或没有产出图像
    #[error("thumbnail generation failed: {0}")]
    Generation(String),

    /// 底层持久化失败（SQLite、磁盘 I/O）
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::Duplicate(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

/// 判断是否为 UNIQUE 约束冲突
pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}
