use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// 视频阅读状态
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    #[default]
    Unread,
    Read,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Unread => "unread",
            VideoStatus::Read => "read",
        }
    }

    /// 切换为另一个状态
    pub fn toggled(&self) -> Self {
        match self {
            VideoStatus::Unread => VideoStatus::Read,
            VideoStatus::Read => VideoStatus::Unread,
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unread" => Ok(VideoStatus::Unread),
            "read" => Ok(VideoStatus::Read),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

impl ToSql for VideoStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for VideoStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// 用户录入的五个文本字段
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pub name: String,
    pub artist: String,
    pub title: String,
    pub category: String,
    pub chord: String,
}

impl VideoMetadata {
    /// 返回第一个为空的字段名（界面层在写入前要求全部非空）
    pub fn first_blank_field(&self) -> Option<&'static str> {
        [
            ("name", &self.name),
            ("artist", &self.artist),
            ("title", &self.title),
            ("category", &self.category),
            ("chord", &self.chord),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
    }
}

/// 目录中的一条视频记录
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VideoRecord {
    pub id: i64,
    pub file_path: String,
    #[serde(flatten)]
    pub metadata: VideoMetadata,
    pub status: VideoStatus,
}

/// 收藏条目
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FavoriteEntry {
    pub id: i64,
    pub video_id: i64,
}

/// 缩略图的获取结果（有界等待）
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "state", content = "path", rename_all = "lowercase")]
pub enum ThumbnailState {
    Ready(PathBuf),
    /// 生成仍在后台进行，完成后会写入缓存
    Pending,
}
