// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::crawl_pipeline::CrawlPipeline;
use crate::queue::job_queue::{JobDescriptor, JobQueue};
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

/// 爬取工作器
///
/// 从队列取出任务描述并交给爬取管道执行，同一时间只运行一个任务
pub struct CrawlWorker {
    id: usize,
    pipeline: Arc<CrawlPipeline>,
    queue: Arc<dyn JobQueue>,
    shutdown: watch::Receiver<bool>,
}

impl CrawlWorker {
    /// 创建新的爬取工作器实例
    pub fn new(
        id: usize,
        pipeline: Arc<CrawlPipeline>,
        queue: Arc<dyn JobQueue>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            pipeline,
            queue,
            shutdown,
        }
    }

    #[instrument(skip(self, descriptor), fields(worker = self.id, job_id = %descriptor.job_id))]
    async fn process(&self, descriptor: JobDescriptor) -> Result<(), WorkerError> {
        match self.pipeline.run(descriptor.job_id).await? {
            Some(summary) => info!(status = %summary.status, "Job processed"),
            None => debug!("Job skipped"),
        }
        Ok(())
    }
}

#[async_trait]
impl Worker for CrawlWorker {
    async fn run(&self) -> Result<(), WorkerError> {
        let mut shutdown = self.shutdown.clone();
        info!(worker = self.id, "Crawl worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            let descriptor = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                next = self.queue.dequeue() => match next {
                    Some(descriptor) => descriptor,
                    None => break,
                },
            };

            // 单个任务失败不影响 worker 继续消费
            if let Err(e) = self.process(descriptor).await {
                error!(worker = self.id, job_id = %descriptor.job_id, error = %e, "Error processing crawl job");
            }
        }

        info!(worker = self.id, "Crawl worker stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "crawl_worker"
    }
}
