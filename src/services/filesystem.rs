use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use walkdir::WalkDir;

use crate::error::Result;
use crate::services::db::VideoDao;
use crate::utils::is_video_extension;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// 扫描目录第一层的视频文件（mp4/avi/mov/mkv），按路径排序
pub fn scan_folder(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut videos = Vec::new();

    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // 根目录本身不可读时直接报错，单个条目出错则跳过
                if e.depth() == 0 {
                    return Err(e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("walkdir error"))
                        .into());
                }
                warn!("跳过无法读取的条目: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .map(is_video_extension)
            .unwrap_or(false);
        if is_video {
            videos.push(path.to_path_buf());
        }
    }

    videos.sort();
    debug!("扫描 {} 找到 {} 个视频文件", folder.display(), videos.len());
    Ok(videos)
}

/// 扫描目录中尚未加入目录的视频文件
pub fn untracked(folder: &Path, dao: &VideoDao<'_>) -> Result<Vec<PathBuf>> {
    let mut missing = Vec::new();
    for path in scan_folder(folder)? {
        if dao.get_by_path(&path.to_string_lossy())?.is_none() {
            missing.push(path);
        }
    }
    Ok(missing)
}

/// 原子写入：先写同目录临时文件并 fsync，再重命名到目标路径
///
/// 失败时删除临时文件，目标路径不会出现写了一半的文件。
pub fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path_for(path);
    let written = write_and_sync(&temp_path, bytes).and_then(|_| fs::rename(&temp_path, path));

    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&temp_path) {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!("删除临时文件失败 {}: {}", temp_path.display(), cleanup);
            }
        }
        return Err(e);
    }

    debug!("已原子写入 {}", path.display());
    Ok(())
}

/// 临时文件名 `<file>.<pid>.<seq>.tmp`
fn temp_path_for(path: &Path) -> PathBuf {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{}.{}.{}.tmp", file_name, process::id(), seq))
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// 是否为 [`atomic_write`] 留下的临时文件
pub fn is_temp_file(path: &Path) -> bool {
    path.extension().map(|e| e == "tmp").unwrap_or(false)
}
