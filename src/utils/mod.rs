mod common;
mod thumbnail;
pub use common::{format_size, is_video_extension};
pub use thumbnail::{cache_key, mtime_nanos, thumbnail_file_name, THUMBNAIL_EXTENSION};
