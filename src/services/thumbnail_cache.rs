//! 缩略图缓存
//!
//! 缓存键为 (源文件路径, 源文件修改时间)，缩略图文件名由键确定：
//! - 命中：目标文件已存在，直接返回，不再校验
//! - 未命中：同一路径同时只有一个生成任务，其余调用方等待并共享结果（或失败）
//! - 源文件被修改后键随之改变，旧缩略图成为孤儿，由 [`ThumbnailCache::prune`] 清理
//!
//! 生成任务与调用方解耦：调用方放弃等待不会取消生成，结果照样写入缓存。

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinSet;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::models::ThumbnailState;
use crate::services::ffmpeg::FrameExtractor;
use crate::services::filesystem::{atomic_write, is_temp_file};
use crate::services::task_queue::{QueueStats, TaskQueue};
use crate::utils::thumbnail_file_name;

/// 抽帧时间点（秒）
pub const THUMBNAIL_OFFSET_SECS: f32 = 1.0;

/// 占位图文件名
pub const PLACEHOLDER_FILE_NAME: &str = "placeholder.svg";

/// 临时文件至少存在这么久才会被清理
const TEMP_FILE_GRACE: Duration = Duration::from_secs(60);

const PLACEHOLDER_SVG: &str = r##"<svg width="320" height="180" xmlns="http://www.w3.org/2000/svg"><rect width="320" height="180" fill="#4A90E2"/><text x="160" y="90" font-family="Arial" font-size="20" fill="white" text-anchor="middle">VIDEO</text></svg>"##;

type Outcome = Option<Result<PathBuf>>;

/// 清理结果
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct PruneReport {
    pub removed: usize,
    pub bytes: u64,
}

/// 缩略图缓存，克隆后共享同一个缓存目录与进行中的任务表
#[derive(Clone)]
pub struct ThumbnailCache {
    dir: PathBuf,
    extractor: Arc<dyn FrameExtractor>,
    queue: TaskQueue,
    in_flight: Arc<DashMap<PathBuf, watch::Receiver<Outcome>>>,
}

impl ThumbnailCache {
    /// 创建缓存，缓存目录不存在时自动创建
    pub fn new(
        dir: impl Into<PathBuf>,
        extractor: Arc<dyn FrameExtractor>,
        max_concurrent: usize,
    ) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
            info!("已创建缩略图目录: {}", dir.display());
        }

        Ok(Self {
            dir,
            extractor,
            queue: TaskQueue::new(max_concurrent),
            in_flight: Arc::new(DashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 当前 (路径, 修改时间) 对应的缩略图路径；源文件不存在时返回 SourceMissing
    pub async fn artifact_path(&self, source: &Path) -> Result<PathBuf> {
        let mtime = source_mtime(source).await?;
        Ok(self.dir.join(thumbnail_file_name(source, mtime)))
    }

    /// 获取缩略图，必要时生成
    pub async fn get_or_generate(&self, source: &Path) -> Result<PathBuf> {
        loop {
            let target = self.artifact_path(source).await?;
            if is_file(&target).await {
                debug!("缩略图命中: {}", target.display());
                return Ok(target);
            }

            let outcome = wait_for_outcome(self.join_or_start(source, &target)).await?;
            if outcome == target {
                return Ok(outcome);
            }
            // 等待期间源文件被修改，共享到的是旧键的结果，按新键重来
            debug!("源文件在生成期间发生变化，重新检查: {}", source.display());
        }
    }

    /// 有界等待：超时返回 Pending，生成继续在后台进行
    pub async fn get_with_timeout(&self, source: &Path, wait: Duration) -> Result<ThumbnailState> {
        match tokio::time::timeout(wait, self.get_or_generate(source)).await {
            Ok(result) => result.map(ThumbnailState::Ready),
            Err(_) => {
                debug!("缩略图仍在生成: {}", source.display());
                Ok(ThumbnailState::Pending)
            }
        }
    }

    /// 批量预生成，结果按源路径排序
    pub async fn warm(&self, sources: Vec<PathBuf>) -> Vec<(PathBuf, Result<PathBuf>)> {
        let mut tasks = JoinSet::new();
        for source in sources {
            let cache = self.clone();
            tasks.spawn(async move {
                let result = cache.get_or_generate(&source).await;
                (source, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!("预生成任务异常退出: {}", e),
            }
        }
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }

    /// 加入进行中的生成，或者发起新的生成
    fn join_or_start(&self, source: &Path, target: &Path) -> watch::Receiver<Outcome> {
        match self.in_flight.entry(source.to_path_buf()) {
            Entry::Occupied(entry) => {
                debug!("等待进行中的缩略图生成: {}", source.display());
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                // 上一次生成可能刚刚完成并移出任务表
                if target.is_file() {
                    let (_, rx) = watch::channel(Some(Ok(target.to_path_buf())));
                    return rx;
                }

                let (tx, rx) = watch::channel(None);
                entry.insert(rx.clone());
                self.spawn_generation(source.to_path_buf(), target.to_path_buf(), tx);
                rx
            }
        }
    }

    fn spawn_generation(&self, source: PathBuf, target: PathBuf, tx: watch::Sender<Outcome>) {
        let extractor = self.extractor.clone();
        let queue = self.queue.clone();
        let in_flight = self.in_flight.clone();

        tokio::spawn(async move {
            debug!("开始生成缩略图: {}", source.display());
            let job_source = source.clone();
            let job_target = target.clone();
            let outcome = queue
                .run(move || generate(extractor.as_ref(), &job_source, &job_target))
                .await;

            match &outcome {
                Ok(path) => info!("缩略图生成成功: {}", path.display()),
                Err(e) => warn!("缩略图生成失败 {}: {}", source.display(), e),
            }

            // 先发布结果再移出任务表：此间加入的调用方拿到同一个结果
            // 移出后失败不再保留，之后的请求会重新生成
            tx.send_replace(Some(outcome));
            in_flight.remove(&source);
        });
    }

    /// 占位图（生成失败时界面使用），首次调用时写入缓存目录
    pub fn placeholder(&self) -> Result<PathBuf> {
        let path = self.dir.join(PLACEHOLDER_FILE_NAME);
        if !path.is_file() {
            atomic_write(&path, PLACEHOLDER_SVG.as_bytes())?;
            debug!("已写入占位图: {}", path.display());
        }
        Ok(path)
    }

    /// 清理孤儿缩略图：不属于任何现存源文件当前键的缩略图都会被删除
    pub fn prune(&self, live_sources: &[PathBuf]) -> Result<PruneReport> {
        let live: HashSet<String> = live_sources
            .iter()
            .filter_map(|source| {
                let mtime = std::fs::metadata(source).and_then(|m| m.modified()).ok()?;
                Some(thumbnail_file_name(source, mtime))
            })
            .collect();

        let mut report = PruneReport::default();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("跳过无法读取的条目: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let name = entry.file_name().to_string_lossy();
            let orphan = if is_temp_file(path) {
                // 生成中的临时文件不能动
                self.in_flight.is_empty() && is_stale(&entry)
            } else {
                name != PLACEHOLDER_FILE_NAME && !live.contains(&*name)
            };
            if !orphan {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            match std::fs::remove_file(path) {
                Ok(()) => {
                    report.removed += 1;
                    report.bytes += size;
                    debug!("已删除孤儿缩略图: {}", path.display());
                }
                Err(e) => warn!("删除缩略图失败 {}: {}", path.display(), e),
            }
        }

        info!("缩略图清理完成，删除 {} 个文件", report.removed);
        Ok(report)
    }

    /// 生成任务统计
    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// 正在生成的源文件数量
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

/// 阻塞执行：抽帧并原子写入目标路径
fn generate(extractor: &dyn FrameExtractor, source: &Path, target: &Path) -> Result<PathBuf> {
    let bytes = extractor
        .extract_frame(source, THUMBNAIL_OFFSET_SECS)
        .map_err(|e| match e {
            Error::Generation(_) => e,
            other => Error::Generation(other.to_string()),
        })?;

    if bytes.is_empty() {
        return Err(Error::Generation(format!(
            "no frame extracted from {}",
            source.display()
        )));
    }

    atomic_write(target, &bytes).map_err(|e| {
        Error::Generation(format!("写入缩略图失败 {}: {}", target.display(), e))
    })?;
    Ok(target.to_path_buf())
}

async fn wait_for_outcome(mut rx: watch::Receiver<Outcome>) -> Result<PathBuf> {
    let outcome = rx
        .wait_for(|outcome| outcome.is_some())
        .await
        .map_err(|_| Error::Generation("生成任务已丢失".to_string()))?
        .clone();
    outcome.unwrap_or_else(|| Err(Error::Generation("生成任务未返回结果".to_string())))
}

async fn source_mtime(source: &Path) -> Result<SystemTime> {
    match tokio::fs::metadata(source).await {
        Ok(meta) if meta.is_file() => Ok(meta.modified()?),
        Ok(_) => Err(Error::SourceMissing(source.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::SourceMissing(source.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn is_stale(entry: &walkdir::DirEntry) -> bool {
    entry
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|mtime| mtime.elapsed().ok())
        .map(|age| age >= TEMP_FILE_GRACE)
        .unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// 计数的假抽帧器
    struct CountingExtractor {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingExtractor {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FrameExtractor for CountingExtractor {
        fn extract_frame(&self, source: &Path, offset_secs: f32) -> Result<Vec<u8>> {
            assert_eq!(offset_secs, THUMBNAIL_OFFSET_SECS);
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if self.fail {
                return Err(Error::Generation(format!("cannot decode {}", source.display())));
            }
            Ok(b"\xFF\xD8fake-jpeg\xFF\xD9".to_vec())
        }
    }

    fn setup(extractor: Arc<CountingExtractor>) -> (TempDir, ThumbnailCache, PathBuf) {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("clip.mp4");
        fs::write(&source, b"video").unwrap();
        let cache = ThumbnailCache::new(dir.path().join("thumbnails"), extractor, 4).unwrap();
        (dir, cache, source)
    }

    fn touch(path: &Path, offset: Duration) {
        set_mtime(path, SystemTime::now() + offset);
    }

    fn set_mtime(path: &Path, mtime: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_second_call_is_cache_hit() {
        let extractor = CountingExtractor::new(Duration::ZERO, false);
        let (_dir, cache, source) = setup(extractor.clone());

        let first = cache.get_or_generate(&source).await.unwrap();
        let second = cache.get_or_generate(&source).await.unwrap();

        assert_eq!(first, second);
        assert!(first.is_file());
        assert!(first.starts_with(cache.dir()));
        assert_eq!(extractor.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mtime_change_regenerates() {
        let extractor = CountingExtractor::new(Duration::ZERO, false);
        let (_dir, cache, source) = setup(extractor.clone());

        let old = cache.get_or_generate(&source).await.unwrap();
        touch(&source, Duration::from_secs(60));
        let new = cache.get_or_generate(&source).await.unwrap();

        assert_ne!(old, new);
        assert_eq!(new, cache.artifact_path(&source).await.unwrap());
        assert_eq!(extractor.calls(), 2);
        // 旧缩略图保留为孤儿
        assert!(old.is_file());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_callers_share_one_generation() {
        let extractor = CountingExtractor::new(Duration::from_millis(200), false);
        let (_dir, cache, source) = setup(extractor.clone());

        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let source = source.clone();
            tasks.spawn(async move { cache.get_or_generate(&source).await });
        }

        let mut results = Vec::new();
        while let Some(done) = tasks.join_next().await {
            results.push(done.unwrap().unwrap());
        }

        assert_eq!(extractor.calls(), 1);
        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|p| p == &results[0]));
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_callers_share_failure() {
        let extractor = CountingExtractor::new(Duration::from_millis(200), true);
        let (_dir, cache, source) = setup(extractor.clone());

        let mut tasks = JoinSet::new();
        for _ in 0..5 {
            let cache = cache.clone();
            let source = source.clone();
            tasks.spawn(async move { cache.get_or_generate(&source).await });
        }

        let mut errors = Vec::new();
        while let Some(done) = tasks.join_next().await {
            errors.push(done.unwrap().unwrap_err());
        }

        assert_eq!(extractor.calls(), 1);
        assert!(errors.iter().all(|e| matches!(e, Error::Generation(_))));
        assert!(errors.iter().all(|e| e == &errors[0]));

        // 没有留下缩略图或临时文件
        let leftovers = fs::read_dir(cache.dir()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_published_outcome_is_shared_before_unregister() {
        let extractor = CountingExtractor::new(Duration::ZERO, false);
        let (_dir, cache, source) = setup(extractor.clone());

        // 生成任务已发布失败、尚未移出任务表
        let failure = Error::Generation("decoder crashed".to_string());
        let (_tx, rx) = watch::channel(Some(Err(failure.clone())));
        cache.in_flight.insert(source.clone(), rx);

        let err = cache.get_or_generate(&source).await.unwrap_err();
        assert_eq!(err, failure);
        assert_eq!(extractor.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_instant_failures_under_contention() {
        let extractor = CountingExtractor::new(Duration::ZERO, true);
        let (_dir, cache, source) = setup(extractor.clone());

        for _ in 0..20 {
            let barrier = Arc::new(tokio::sync::Barrier::new(16));
            let mut tasks = JoinSet::new();
            for _ in 0..16 {
                let cache = cache.clone();
                let source = source.clone();
                let barrier = barrier.clone();
                tasks.spawn(async move {
                    barrier.wait().await;
                    cache.get_or_generate(&source).await
                });
            }

            let mut errors = Vec::new();
            while let Some(done) = tasks.join_next().await {
                errors.push(done.unwrap().unwrap_err());
            }
            assert_eq!(errors.len(), 16);
            assert!(errors.iter().all(|e| matches!(e, Error::Generation(_))));
            assert!(errors.iter().all(|e| e == &errors[0]));
        }

        assert_eq!(cache.in_flight_count(), 0);
        assert!(extractor.calls() <= 20 * 16);
        assert_eq!(cache.stats().failed_count as usize, extractor.calls());
    }

    /// 记录同时运行的抽帧数量
    struct PeakExtractor {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FrameExtractor for PeakExtractor {
        fn extract_frame(&self, _source: &Path, _offset_secs: f32) -> Result<Vec<u8>> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(200));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(b"\xFF\xD8fake-jpeg\xFF\xD9".to_vec())
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_distinct_sources_generate_in_parallel() {
        let extractor = Arc::new(PeakExtractor {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let dir = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(dir.path().join("thumbnails"), extractor.clone(), 4).unwrap();

        let sources: Vec<PathBuf> = (0..4)
            .map(|i| {
                let path = dir.path().join(format!("clip{}.mp4", i));
                fs::write(&path, b"video").unwrap();
                path
            })
            .collect();

        let results = cache.warm(sources).await;
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert!(extractor.peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_prune_keeps_recent_temp_files() {
        let extractor = CountingExtractor::new(Duration::ZERO, false);
        let (_dir, cache, source) = setup(extractor);

        let temp = cache.dir().join("clip-0000.jpg.1.0.tmp");
        fs::write(&temp, b"partial").unwrap();

        let report = cache.prune(&[source.clone()]).unwrap();
        assert_eq!(report.removed, 0);
        assert!(temp.is_file());

        set_mtime(&temp, SystemTime::now() - Duration::from_secs(3600));
        let report = cache.prune(&[source]).unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(report.bytes, 7);
        assert!(!temp.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_is_not_cached() {
        let extractor = CountingExtractor::new(Duration::ZERO, true);
        let (_dir, cache, source) = setup(extractor.clone());

        assert!(cache.get_or_generate(&source).await.is_err());
        assert!(cache.get_or_generate(&source).await.is_err());
        assert_eq!(extractor.calls(), 2);
        assert_eq!(cache.stats().failed_count, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_source() {
        let extractor = CountingExtractor::new(Duration::ZERO, false);
        let (dir, cache, _source) = setup(extractor.clone());

        let err = cache
            .get_or_generate(&dir.path().join("gone.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SourceMissing(_)));
        assert_eq!(extractor.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_abandoned_wait_still_populates_cache() {
        let extractor = CountingExtractor::new(Duration::from_millis(300), false);
        let (_dir, cache, source) = setup(extractor.clone());

        let state = cache
            .get_with_timeout(&source, Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(state, ThumbnailState::Pending);

        let target = cache.artifact_path(&source).await.unwrap();
        for _ in 0..100 {
            if target.is_file() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(target.is_file());

        let state = cache
            .get_with_timeout(&source, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(state, ThumbnailState::Ready(target));
        assert_eq!(extractor.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_warm_and_prune() {
        let extractor = CountingExtractor::new(Duration::ZERO, false);
        let (dir, cache, source) = setup(extractor.clone());
        let other = dir.path().join("other.mp4");
        fs::write(&other, b"video").unwrap();

        let results = cache.warm(vec![other.clone(), source.clone()]).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, source);
        assert!(results.iter().all(|(_, r)| r.is_ok()));

        let placeholder = cache.placeholder().unwrap();
        let stale = cache.get_or_generate(&source).await.unwrap();
        touch(&source, Duration::from_secs(60));
        let fresh = cache.get_or_generate(&source).await.unwrap();

        // other.mp4 不再是现存源文件
        let report = cache.prune(&[source.clone()]).unwrap();
        assert_eq!(report.removed, 2);
        assert!(!stale.exists());
        assert!(fresh.is_file());
        assert!(placeholder.is_file());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_placeholder_written_once() {
        let extractor = CountingExtractor::new(Duration::ZERO, false);
        let (_dir, cache, _source) = setup(extractor);

        let first = cache.placeholder().unwrap();
        let second = cache.placeholder().unwrap();
        assert_eq!(first, second);
        assert!(fs::read_to_string(first).unwrap().contains("<svg"));
    }
}
