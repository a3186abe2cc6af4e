use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{is_unique_violation, Error, Result};
use crate::models::{FavoriteEntry, VideoRecord};
use crate::services::db::connection::CatalogDb;
use crate::services::db::schema::queries;
use crate::services::db::video_dao::{fetch_by_id, map_video_row};

/// 收藏数据访问对象
///
/// 收藏表通过外键引用视频表；删除视频时由 [`VideoDao::delete`] 在同一事务内
/// 调用 [`FavoritesDao::cascade_delete`]。
///
/// [`VideoDao::delete`]: crate::services::db::VideoDao::delete
pub struct FavoritesDao<'a> {
    db: &'a CatalogDb,
}

impl<'a> FavoritesDao<'a> {
    pub fn new(db: &'a CatalogDb) -> Self {
        Self { db }
    }

    /// 加入收藏；视频不存在返回 NotFound，已收藏返回 Duplicate
    pub fn add(&self, video_id: i64) -> Result<FavoriteEntry> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        if fetch_by_id(&tx, video_id)?.is_none() {
            return Err(Error::NotFound(format!("video id {}", video_id)));
        }

        match tx.execute(queries::INSERT_FAVORITE, params![video_id]) {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(Error::Duplicate(format!("video {} is already a favorite", video_id)));
            }
            Err(e) => return Err(e.into()),
        }

        let entry = FavoriteEntry {
            id: tx.last_insert_rowid(),
            video_id,
        };
        tx.commit()?;

        info!("视频 {} 已加入收藏", video_id);
        Ok(entry)
    }

    /// 移除收藏；当前未收藏返回 NotFound
    pub fn remove(&self, video_id: i64) -> Result<()> {
        let conn = self.db.lock()?;
        let removed = conn.execute(queries::DELETE_FAVORITE, params![video_id])?;
        if removed == 0 {
            return Err(Error::NotFound(format!("video {} is not a favorite", video_id)));
        }

        info!("视频 {} 已移出收藏", video_id);
        Ok(())
    }

    /// 获取收藏的视频（关联出完整记录）
    pub fn list(&self) -> Result<Vec<VideoRecord>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(queries::SELECT_FAVORITE_VIDEOS)?;
        let video_iter = stmt.query_map([], map_video_row)?;

        let mut videos = Vec::new();
        for video in video_iter {
            videos.push(video?);
        }
        Ok(videos)
    }

    /// 是否已收藏
    pub fn is_favorite(&self, video_id: i64) -> Result<bool> {
        let conn = self.db.lock()?;
        let entry = conn
            .query_row(queries::SELECT_FAVORITE, params![video_id], |row| {
                Ok(FavoriteEntry {
                    id: row.get(0)?,
                    video_id: row.get(1)?,
                })
            })
            .optional()?;
        Ok(entry.is_some())
    }

    /// 级联删除钩子：移除引用该视频的收藏，没有也不报错
    ///
    /// 只能在调用方已开启的事务内使用。
    pub(crate) fn cascade_delete(conn: &Connection, video_id: i64) -> Result<usize> {
        let removed = conn.execute(queries::DELETE_FAVORITE, params![video_id])?;
        debug!("级联删除视频 {} 的收藏 {} 条", video_id, removed);
        Ok(removed)
    }
}
