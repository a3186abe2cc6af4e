//! 后台生成任务池
//!
//! 缩略图生成是 I/O 与 CPU 密集的阻塞操作，统一在这里调度：
//! - 信号量控制同时运行的任务数
//! - 任务在 tokio 的阻塞线程池中执行
//! - 记录排队、运行、完成、失败的数量

use log::{debug, warn};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::{Error, Result};

/// 任务队列统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub pending_count: usize,
    pub running_count: usize,
    pub completed_count: u64,
    pub failed_count: u64,
}

/// 后台任务池，克隆后共享同一组计数器与信号量
#[derive(Clone)]
pub struct TaskQueue {
    semaphore: Arc<Semaphore>,
    pending_count: Arc<AtomicUsize>,
    running_count: Arc<AtomicUsize>,
    completed_count: Arc<AtomicU64>,
    failed_count: Arc<AtomicU64>,
}

impl TaskQueue {
    /// 创建新的任务池，并发数至少为 1
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        debug!("任务池已创建，最大并发数: {}", max_concurrent);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            pending_count: Arc::new(AtomicUsize::new(0)),
            running_count: Arc::new(AtomicUsize::new(0)),
            completed_count: Arc::new(AtomicU64::new(0)),
            failed_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 排队执行一个阻塞任务并等待结果
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.pending_count.fetch_add(1, Ordering::SeqCst);
        let permit = self.semaphore.clone().acquire_owned().await;
        self.pending_count.fetch_sub(1, Ordering::SeqCst);
        let _permit = permit.map_err(|_| Error::Generation("任务池已关闭".to_string()))?;

        self.running_count.fetch_add(1, Ordering::SeqCst);
        let result = match tokio::task::spawn_blocking(job).await {
            Ok(result) => result,
            Err(e) => Err(Error::Generation(format!("生成任务异常退出: {}", e))),
        };
        self.running_count.fetch_sub(1, Ordering::SeqCst);

        match &result {
            Ok(_) => {
                self.completed_count.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                self.failed_count.fetch_add(1, Ordering::SeqCst);
                warn!("任务失败: {}", e);
            }
        }
        result
    }

    /// 获取队列统计信息
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending_count: self.pending_count.load(Ordering::SeqCst),
            running_count: self.running_count.load(Ordering::SeqCst),
            completed_count: self.completed_count.load(Ordering::SeqCst),
            failed_count: self.failed_count.load(Ordering::SeqCst),
        }
    }
}
