// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_job::CrawlJobStatus;
use crate::domain::repositories::crawl_job_repository::CrawlJobRepository;
use crate::domain::services::crawl_pipeline::CrawlPipeline;
use crate::queue::job_queue::{JobDescriptor, JobQueue};
use crate::utils::errors::WorkerError;
use crate::workers::crawl_worker::CrawlWorker;
use crate::workers::worker::Worker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 进程崩溃时仍在运行的任务的失败原因
pub const INTERRUPTED_REASON: &str = "interrupted";

/// 工作管理器
///
/// 持有 worker 池和共享的关闭信号
pub struct WorkerManager {
    pipeline: Arc<CrawlPipeline>,
    queue: Arc<dyn JobQueue>,
    jobs: Arc<dyn CrawlJobRepository>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerManager {
    pub fn new(
        pipeline: Arc<CrawlPipeline>,
        queue: Arc<dyn JobQueue>,
        jobs: Arc<dyn CrawlJobRepository>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            pipeline,
            queue,
            jobs,
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// 订阅关闭信号，供调度器等其他后台任务使用
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// 启动爬取工作进程
    ///
    /// # 参数
    ///
    /// * `count` - 要启动的工作进程数量
    pub fn start_workers(&mut self, count: usize) {
        for id in 0..count {
            let worker = CrawlWorker::new(
                id,
                self.pipeline.clone(),
                self.queue.clone(),
                self.shutdown_signal(),
            );
            self.spawn(Arc::new(worker));
        }
        info!("Started {} crawl workers", count);
    }

    /// 在后台运行任意工作器
    pub fn spawn(&mut self, worker: Arc<dyn Worker>) {
        let handle = tokio::spawn(async move {
            if let Err(e) = worker.run().await {
                error!(worker = worker.name(), error = %e, "Worker exited with error");
            }
        });
        self.handles.push(handle);
    }

    /// 启动时恢复上次进程遗留的任务
    ///
    /// running 的任务置为失败，pending 的任务重新入队。
    /// 队列有界，需在 worker 启动之后调用。
    ///
    /// # 返回值
    ///
    /// * `Ok((failed, requeued))` - 置为失败和重新入队的任务数
    pub async fn recover_jobs(&self) -> Result<(u64, usize), WorkerError> {
        let failed = self.jobs.fail_interrupted(INTERRUPTED_REASON).await?;
        if failed > 0 {
            warn!("Marked {} interrupted crawl jobs as failed", failed);
        }

        let pending = self.jobs.find_by_status(CrawlJobStatus::Pending).await?;
        let requeued = pending.len();
        for job in pending {
            self.queue
                .enqueue(JobDescriptor {
                    job_id: job.id,
                    site_config_id: job.site_config_id,
                })
                .await?;
        }
        if requeued > 0 {
            info!("Re-enqueued {} pending crawl jobs", requeued);
        }
        Ok((failed, requeued))
    }

    /// 发送关闭信号并等待工作进程退出
    ///
    /// 运行中的任务会被请求取消：当前请求完成后以 cancelled 结束，
    /// 宽限期内仍未退出的工作进程会被中止
    pub async fn shutdown(self, grace: Duration) {
        info!("Shutting down workers...");
        // 没有订阅者时发送失败，无需处理
        let _ = self.shutdown_tx.send(true);
        let cancelled = self.pipeline.cancellation().cancel_all();
        if cancelled > 0 {
            info!("Requested cancellation of {} running crawl jobs", cancelled);
        }

        let deadline = tokio::time::Instant::now() + grace;
        for handle in self.handles {
            let abort = handle.abort_handle();
            if tokio::time::timeout_at(deadline, handle).await.is_err() {
                warn!("Worker did not stop within grace period, aborting");
                abort.abort();
            }
        }

        info!("Workers shut down successfully");
    }
}
