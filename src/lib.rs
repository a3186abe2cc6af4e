//! 本地视频目录核心
//!
//! - 目录存储：视频记录的增删改查、阅读状态（[`services::VideoDao`]）
//! - 收藏：外键关联视频，删除视频时级联删除（[`services::FavoritesDao`]）
//! - 分类查询（[`services::CategoryQuery`]）
//! - 缩略图缓存：按 (路径, 修改时间) 缓存，同一路径单飞生成（[`services::ThumbnailCache`]）
//!
//! 界面层只通过这些操作与核心交互；所有操作返回值或 [`Error`]。

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{Error, Result};
pub use models::{FavoriteEntry, ThumbnailState, VideoMetadata, VideoRecord, VideoStatus};
