//! 数据库表结构定义
//!
//! 定义视频表和收藏表的结构以及常用 SQL 语句

/// 建表语句，重复执行不会报错也不会重复建表
pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS videos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_name TEXT UNIQUE NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        artist TEXT NOT NULL DEFAULT '',
        title TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL DEFAULT '',
        chord TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'unread' CHECK (status IN ('unread', 'read'))
    );

    CREATE TABLE IF NOT EXISTS favorites (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        video_id INTEGER NOT NULL UNIQUE REFERENCES videos(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_videos_category ON videos(category);
";

/// SQL 查询语句常量
pub mod queries {
    pub const INSERT_VIDEO: &str = "INSERT INTO videos
        (file_name, name, artist, title, category, chord, status)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'unread')";

    pub const UPDATE_METADATA: &str = "UPDATE videos
        SET name = ?2, artist = ?3, title = ?4, category = ?5, chord = ?6
        WHERE id = ?1";

    pub const UPDATE_STATUS: &str = "UPDATE videos SET status = ?2 WHERE file_name = ?1";

    pub const DELETE_VIDEO: &str = "DELETE FROM videos WHERE id = ?1";

    pub const SELECT_BY_ID: &str = "SELECT id, file_name, name, artist, title, category, chord, status
        FROM videos WHERE id = ?1";

    pub const SELECT_BY_PATH: &str = "SELECT id, file_name, name, artist, title, category, chord, status
        FROM videos WHERE file_name = ?1";

    pub const SELECT_ALL: &str = "SELECT id, file_name, name, artist, title, category, chord, status
        FROM videos ORDER BY id ASC";

    pub const SELECT_BY_CATEGORY: &str = "SELECT id, file_name, name, artist, title, category, chord, status
        FROM videos WHERE category = ?1 ORDER BY id ASC";

    pub const SELECT_CATEGORIES: &str =
        "SELECT DISTINCT category FROM videos WHERE category <> '' ORDER BY category ASC";

    pub const INSERT_FAVORITE: &str = "INSERT INTO favorites (video_id) VALUES (?1)";

    pub const DELETE_FAVORITE: &str = "DELETE FROM favorites WHERE video_id = ?1";

    pub const SELECT_FAVORITE: &str = "SELECT id, video_id FROM favorites WHERE video_id = ?1";

    pub const SELECT_FAVORITE_VIDEOS: &str = "SELECT v.id, v.file_name, v.name, v.artist, v.title, v.category, v.chord, v.status
        FROM favorites f
        JOIN videos v ON v.id = f.video_id
        ORDER BY v.id ASC";
}
