use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{is_unique_violation, Error, Result};
use crate::models::{VideoMetadata, VideoRecord, VideoStatus};
use crate::services::db::connection::CatalogDb;
use crate::services::db::favorites_dao::FavoritesDao;
use crate::services::db::schema::queries;

/// 视频数据访问对象
///
/// 提供视频记录的增删改查操作，拥有记录的唯一性与生命周期
pub struct VideoDao<'a> {
    db: &'a CatalogDb,
}

impl<'a> VideoDao<'a> {
    /// 创建新的视频数据访问对象
    pub fn new(db: &'a CatalogDb) -> Self {
        Self { db }
    }

    /// 新增视频记录，状态为 unread；路径已存在时返回 Duplicate
    pub fn insert(&self, file_path: &str, metadata: &VideoMetadata) -> Result<VideoRecord> {
        let conn = self.db.lock()?;
        let inserted = conn.execute(
            queries::INSERT_VIDEO,
            params![
                file_path,
                metadata.name,
                metadata.artist,
                metadata.title,
                metadata.category,
                metadata.chord,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                debug!("重复的视频路径: {}", file_path);
                return Err(Error::Duplicate(format!("video '{}' already cataloged", file_path)));
            }
            Err(e) => return Err(e.into()),
        }

        let id = conn.last_insert_rowid();
        info!("视频已加入目录: {} (id={})", file_path, id);
        fetch_by_id(&conn, id)?
            .ok_or_else(|| Error::Storage(format!("inserted video {} vanished", id)))
    }

    /// 覆盖五个文本字段，不修改状态
    pub fn update(&self, id: i64, metadata: &VideoMetadata) -> Result<VideoRecord> {
        let conn = self.db.lock()?;
        let changed = conn.execute(
            queries::UPDATE_METADATA,
            params![
                id,
                metadata.name,
                metadata.artist,
                metadata.title,
                metadata.category,
                metadata.chord,
            ],
        )?;
        if changed == 0 {
            return Err(video_id_not_found(id));
        }

        info!("视频 {} 的元数据已更新", id);
        fetch_by_id(&conn, id)?.ok_or_else(|| video_id_not_found(id))
    }

    /// 删除视频记录，同一事务内先级联删除收藏
    pub fn delete(&self, id: i64) -> Result<()> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        if fetch_by_id(&tx, id)?.is_none() {
            return Err(video_id_not_found(id));
        }

        let unfavorited = FavoritesDao::cascade_delete(&tx, id)?;
        tx.execute(queries::DELETE_VIDEO, params![id])?;
        tx.commit()?;

        info!("视频 {} 已删除，级联移除收藏 {} 条", id, unfavorited);
        Ok(())
    }

    /// 按路径查询
    pub fn get_by_path(&self, file_path: &str) -> Result<Option<VideoRecord>> {
        let conn = self.db.lock()?;
        let video = conn
            .query_row(queries::SELECT_BY_PATH, params![file_path], map_video_row)
            .optional()?;
        Ok(video)
    }

    /// 按 id 查询
    pub fn get_by_id(&self, id: i64) -> Result<Option<VideoRecord>> {
        let conn = self.db.lock()?;
        fetch_by_id(&conn, id)
    }

    /// 获取全部视频，按 id 升序
    pub fn list_all(&self) -> Result<Vec<VideoRecord>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(queries::SELECT_ALL)?;
        let video_iter = stmt.query_map([], map_video_row)?;

        let mut videos: Vec<VideoRecord> = Vec::new();
        for video in video_iter {
            videos.push(video?);
        }
        Ok(videos)
    }

    /// 设置阅读状态；状态相同时幂等
    pub fn set_status(&self, file_path: &str, status: VideoStatus) -> Result<VideoRecord> {
        let conn = self.db.lock()?;
        let changed = conn.execute(queries::UPDATE_STATUS, params![file_path, status])?;
        if changed == 0 {
            return Err(video_path_not_found(file_path));
        }

        debug!("视频 '{}' 状态更新为 {}", file_path, status);
        conn.query_row(queries::SELECT_BY_PATH, params![file_path], map_video_row)
            .optional()?
            .ok_or_else(|| video_path_not_found(file_path))
    }

    /// 在 read / unread 之间切换
    pub fn toggle_status(&self, file_path: &str) -> Result<VideoRecord> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        let current = tx
            .query_row(queries::SELECT_BY_PATH, params![file_path], map_video_row)
            .optional()?
            .ok_or_else(|| video_path_not_found(file_path))?;

        let next = current.status.toggled();
        tx.execute(queries::UPDATE_STATUS, params![file_path, next])?;
        tx.commit()?;

        debug!("视频 '{}' 状态切换为 {}", file_path, next);
        Ok(VideoRecord {
            status: next,
            ..current
        })
    }
}

/// 行映射：id, file_name, name, artist, title, category, chord, status
pub(crate) fn map_video_row(row: &Row<'_>) -> rusqlite::Result<VideoRecord> {
    Ok(VideoRecord {
        id: row.get(0)?,
        file_path: row.get(1)?,
        metadata: VideoMetadata {
            name: row.get(2)?,
            artist: row.get(3)?,
            title: row.get(4)?,
            category: row.get(5)?,
            chord: row.get(6)?,
        },
        status: row.get(7)?,
    })
}

pub(crate) fn fetch_by_id(conn: &Connection, id: i64) -> Result<Option<VideoRecord>> {
    let video = conn
        .query_row(queries::SELECT_BY_ID, params![id], map_video_row)
        .optional()?;
    Ok(video)
}

fn video_id_not_found(id: i64) -> Error {
    Error::NotFound(format!("video id {}", id))
}

fn video_path_not_found(file_path: &str) -> Error {
    Error::NotFound(format!("video '{}'", file_path))
}
