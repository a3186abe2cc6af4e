use rusqlite::params;

use crate::error::Result;
use crate::models::VideoRecord;
use crate::services::db::connection::CatalogDb;
use crate::services::db::schema::queries;
use crate::services::db::video_dao::{map_video_row, VideoDao};

/// 表示“全部分类”的哨兵值
pub const ALL_CATEGORIES: &str = "All";

/// 按分类过滤的只读查询
pub struct CategoryQuery<'a> {
    db: &'a CatalogDb,
}

impl<'a> CategoryQuery<'a> {
    pub fn new(db: &'a CatalogDb) -> Self {
        Self { db }
    }

    /// 按分类精确（区分大小写）过滤；`"All"` 或空值返回全部
    pub fn filter(&self, category: Option<&str>) -> Result<Vec<VideoRecord>> {
        let category = match category {
            Some(c) if !c.is_empty() && c != ALL_CATEGORIES => c,
            _ => return VideoDao::new(self.db).list_all(),
        };

        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(queries::SELECT_BY_CATEGORY)?;
        let video_iter = stmt.query_map(params![category], map_video_row)?;

        let mut videos = Vec::new();
        for video in video_iter {
            videos.push(video?);
        }
        Ok(videos)
    }

    /// 所有非空分类，升序去重
    pub fn categories(&self) -> Result<Vec<String>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(queries::SELECT_CATEGORIES)?;
        let iter = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut categories = Vec::new();
        for category in iter {
            categories.push(category?);
        }
        Ok(categories)
    }
}
