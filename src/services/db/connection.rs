use log::{debug, info};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::services::db::schema::SCHEMA;

/// 数据库连接管理器
///
/// 负责数据库连接的创建、初始化和关闭。进程启动时创建一次，
/// 以引用的形式传给各个数据访问对象。
pub struct CatalogDb {
    conn: Mutex<Connection>,
}

impl CatalogDb {
    /// 打开（或创建）数据库文件并初始化表结构
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        // WAL 提升并发读；synchronous=FULL 保证提交后即落盘
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = FULL;")?;

        let db = Self::with_connection(conn)?;
        info!("目录数据库已打开: {}", db_path.display());
        Ok(db)
    }

    /// 内存数据库，连接关闭即销毁
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize_schema()?;
        Ok(db)
    }

    /// 应用建表语句（幂等）
    pub fn initialize_schema(&self) -> Result<()> {
        self.lock()?.execute_batch(SCHEMA)?;
        debug!("表结构已就绪");
        Ok(())
    }

    /// 获取连接，一次操作内持有
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::Storage(format!("数据库连接锁已损坏: {}", e)))
    }

    /// 关闭数据库连接
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|e| Error::Storage(format!("数据库连接锁已损坏: {}", e)))?;
        conn.close().map_err(|(_, e)| Error::from(e))?;
        info!("目录数据库已关闭");
        Ok(())
    }
}
