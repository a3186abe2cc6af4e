//! 数据库模块
//!
//! 提供视频目录的数据库管理功能，包括连接管理、视频记录、收藏关系和分类查询。

pub mod category;
pub mod connection;
pub mod favorites_dao;
pub mod schema;
pub mod video_dao;

pub use category::{CategoryQuery, ALL_CATEGORIES};
pub use connection::CatalogDb;
pub use favorites_dao::FavoritesDao;
pub use video_dao::VideoDao;
