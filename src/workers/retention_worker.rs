// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::crawl_job_repository::CrawlJobRepository;
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// 日志保留清理工作器
///
/// 定期删除超过保留期的爬取日志，任务记录本身保留
pub struct RetentionWorker {
    jobs: Arc<dyn CrawlJobRepository>,
    retention: chrono::Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl RetentionWorker {
    /// # 参数
    ///
    /// * `retention_days` - 日志保留天数
    /// * `interval` - 清理间隔
    pub fn new(
        jobs: Arc<dyn CrawlJobRepository>,
        retention_days: i64,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            jobs,
            retention: chrono::Duration::days(retention_days),
            interval,
            shutdown,
        }
    }

    /// 执行一次清理，返回删除的日志条数
    pub async fn cleanup_once(&self) -> Result<u64, WorkerError> {
        let cutoff = Utc::now() - self.retention;
        Ok(self.jobs.delete_logs_before(cutoff).await?)
    }
}

#[async_trait]
impl Worker for RetentionWorker {
    async fn run(&self) -> Result<(), WorkerError> {
        info!(
            retention_days = self.retention.num_days(),
            "Crawl log retention worker started"
        );

        let mut shutdown = self.shutdown.clone();
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    match self.cleanup_once().await {
                        Ok(count) => {
                            if count > 0 {
                                info!("Deleted {} expired crawl log entries", count);
                            }
                        }
                        Err(e) => {
                            error!("Failed to cleanup crawl logs: {}", e);
                        }
                    }
                }
            }
        }

        info!("Crawl log retention worker stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "retention_worker"
    }
}

#[cfg(test)]
#[path = "retention_worker_test.rs"]
mod tests;
