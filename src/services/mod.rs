pub mod db;
pub mod ffmpeg;
pub mod filesystem;
pub mod task_queue;
pub mod thumbnail_cache;

pub use db::{CatalogDb, CategoryQuery, FavoritesDao, VideoDao, ALL_CATEGORIES};
pub use ffmpeg::{FFmpegConfig, FFmpegExtractor, FrameExtractor};
pub use filesystem::{scan_folder, untracked};
pub use task_queue::{QueueStats, TaskQueue};
pub use thumbnail_cache::{PruneReport, ThumbnailCache, THUMBNAIL_OFFSET_SECS};
