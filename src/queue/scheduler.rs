// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::use_cases::crawl_use_case::CrawlUseCase;
use crate::domain::repositories::crawl_job_repository::{CrawlJobRepository, RepositoryError};
use crate::domain::repositories::site_config_repository::SiteConfigRepository;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// 调度器触发者标识
pub const SCHEDULER_TRIGGER: &str = "scheduler";

/// 爬取调度器
///
/// 按固定间隔检查到期的站点配置并触发爬取，已有 pending 或 running 任务的配置会被跳过
pub struct CrawlScheduler {
    site_configs: Arc<dyn SiteConfigRepository>,
    jobs: Arc<dyn CrawlJobRepository>,
    crawl_use_case: Arc<CrawlUseCase>,
    tick_interval: Duration,
}

impl CrawlScheduler {
    /// 创建新的调度器实例
    ///
    /// # 参数
    ///
    /// * `site_configs` - 站点配置仓库
    /// * `jobs` - 任务仓库
    /// * `crawl_use_case` - 用于触发任务的用例
    /// * `tick_interval` - 检查间隔
    pub fn new(
        site_configs: Arc<dyn SiteConfigRepository>,
        jobs: Arc<dyn CrawlJobRepository>,
        crawl_use_case: Arc<CrawlUseCase>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            site_configs,
            jobs,
            crawl_use_case,
            tick_interval,
        }
    }

    /// 执行一次调度检查
    ///
    /// # 返回值
    ///
    /// * `Ok(usize)` - 本次触发的任务数
    /// * `Err(RepositoryError)` - 无法读取到期配置
    pub async fn tick(&self) -> Result<usize, RepositoryError> {
        let due = self.site_configs.find_due(Utc::now()).await?;
        let mut triggered = 0;

        for config in due {
            match self.jobs.has_active_job(config.id).await {
                Ok(true) => {
                    debug!(site_config_id = %config.id, "Config already has an active job, skipping");
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(site_config_id = %config.id, error = %e, "Failed to check active jobs");
                    continue;
                }
            }

            match self
                .crawl_use_case
                .trigger_crawl(config.id, SCHEDULER_TRIGGER)
                .await
            {
                Ok(job) => {
                    triggered += 1;
                    info!(
                        job_id = %job.id,
                        site_config_id = %config.id,
                        domain = %config.domain,
                        "Scheduled crawl triggered"
                    );
                }
                Err(e) => {
                    error!(site_config_id = %config.id, error = %e, "Failed to trigger scheduled crawl");
                }
            }
        }

        Ok(triggered)
    }

    /// 启动调度器后台任务，收到关闭信号后退出
    ///
    /// # 返回值
    ///
    /// 返回后台任务的句柄
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(tick_seconds = self.tick_interval.as_secs(), "Crawl scheduler started");
            let mut ticker = interval(self.tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        match self.tick().await {
                            Ok(count) if count > 0 => info!("Scheduler triggered {} crawls", count),
                            Ok(_) => debug!("Scheduler tick, nothing due"),
                            Err(e) => error!("Scheduler tick failed: {}", e),
                        }
                    }
                }
            }
            info!("Crawl scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::site_config::SiteConfig;
    use crate::domain::services::cancellation::CancellationRegistry;
    use crate::infrastructure::repositories::crawl_job_repo_impl::CrawlJobRepositoryImpl;
    use crate::infrastructure::repositories::site_config_repo_impl::SiteConfigRepositoryImpl;
    use crate::queue::job_queue::{ChannelJobQueue, JobQueue};
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ConnectOptions, Database};
    use serde_json::json;

    #[tokio::test]
    async fn test_tick_triggers_due_configs_once() {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let db = Arc::new(db);

        let site_configs = Arc::new(SiteConfigRepositoryImpl::new(db.clone()));
        let jobs = Arc::new(CrawlJobRepositoryImpl::new(db));
        let queue = Arc::new(ChannelJobQueue::new(16));
        let use_case = Arc::new(CrawlUseCase::new(
            site_configs.clone(),
            jobs.clone(),
            queue.clone(),
            CancellationRegistry::new(),
        ));

        let due = SiteConfig::new("due", "reddit.com", "reddit", json!({}));
        let mut fresh = SiteConfig::new("fresh", "medium.com", "medium", json!({}));
        fresh.last_crawl_at = Some(Utc::now());
        let mut disabled = SiteConfig::new("off", "example.com", "json_api", json!({}));
        disabled.enabled = false;
        for config in [&due, &fresh, &disabled] {
            site_configs.create(config).await.unwrap();
        }

        let scheduler = CrawlScheduler::new(
            site_configs.clone(),
            jobs.clone(),
            use_case,
            Duration::from_secs(60),
        );

        assert_eq!(scheduler.tick().await.unwrap(), 1);
        let descriptor = queue.dequeue().await.unwrap();
        assert_eq!(descriptor.site_config_id, due.id);
        let job = jobs.find_by_id(descriptor.job_id).await.unwrap().unwrap();
        assert_eq!(job.triggered_by, SCHEDULER_TRIGGER);

        // 上一个任务仍为 pending，不会重复触发
        assert_eq!(scheduler.tick().await.unwrap(), 0);
        assert!(queue.is_empty());
    }
}
