// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::{
    domain::{
        models::crawl_job::{
            CrawlJob, CrawlJobStatus, CrawlLogEntry, JobOutputTotals, JobStatusCounts,
        },
        repositories::{
            crawl_job_repository::{CrawlJobRepository, RepositoryError},
            site_config_repository::SiteConfigRepository,
        },
        services::cancellation::CancellationRegistry,
    },
    queue::job_queue::{JobDescriptor, JobQueue, QueueError},
};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_JOB_LIST_LIMIT: u64 = 50;
const DEFAULT_PERFORMANCE_DAYS: u32 = 7;

#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("Site config {0} not found")]
    SiteConfigNotFound(Uuid),
    #[error("Site config {0} is disabled")]
    ConfigDisabled(Uuid),
    #[error("Crawl job {0} not found")]
    JobNotFound(Uuid),
    #[error("Crawl job {0} is not running in this process")]
    NotCancellable(Uuid),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// 取消请求的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "status", rename_all = "snake_case")]
pub enum CancelOutcome {
    /// 任务尚未开始，已直接置为 cancelled
    Cancelled,
    /// 任务正在运行，已设置取消标志，下一页前退出
    CancellationRequested,
    /// 任务已处于终态
    AlreadyFinished(CrawlJobStatus),
}

/// 爬取概况
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlStatsSummary {
    pub total_configs: u64,
    /// 已启用的站点配置数
    pub active_configs: u64,
    pub running_jobs: u64,
    pub pending_jobs: u64,
    /// 最近 24 小时创建的任务
    pub jobs_24h: JobStatusCounts,
    /// 最近 7 天创建的任务
    pub jobs_7d: JobStatusCounts,
}

/// 站点配置最近一段时间的运行表现
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigPerformance {
    pub site_config_id: Uuid,
    pub days: u32,
    pub jobs: JobStatusCounts,
    /// completed 占全部任务的百分比，保留一位小数
    pub success_rate: f64,
    /// completed 与 partial 任务的累计产出
    pub totals: JobOutputTotals,
}

fn success_rate(jobs: &JobStatusCounts) -> f64 {
    if jobs.total == 0 {
        return 0.0;
    }
    (jobs.completed as f64 / jobs.total as f64 * 1000.0).round() / 10.0
}

/// 爬取用例
///
/// 负责创建任务并投递到队列，以及任务的查询与取消
pub struct CrawlUseCase {
    site_configs: Arc<dyn SiteConfigRepository>,
    jobs: Arc<dyn CrawlJobRepository>,
    queue: Arc<dyn JobQueue>,
    cancellation: CancellationRegistry,
}

impl CrawlUseCase {
    pub fn new(
        site_configs: Arc<dyn SiteConfigRepository>,
        jobs: Arc<dyn CrawlJobRepository>,
        queue: Arc<dyn JobQueue>,
        cancellation: CancellationRegistry,
    ) -> Self {
        Self {
            site_configs,
            jobs,
            queue,
            cancellation,
        }
    }

    /// 触发一次爬取
    ///
    /// 同步创建 pending 任务，然后把任务描述放入队列，由 worker 异步执行。
    ///
    /// # 参数
    ///
    /// * `site_config_id` - 站点配置ID
    /// * `triggered_by` - 触发者（api、scheduler）
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlJob)` - 新建的待处理任务
    /// * `Err(TriggerError)` - 配置不存在、已停用或存储/队列不可用
    pub async fn trigger_crawl(
        &self,
        site_config_id: Uuid,
        triggered_by: &str,
    ) -> Result<CrawlJob, TriggerError> {
        let config = self
            .site_configs
            .find_by_id(site_config_id)
            .await?
            .ok_or(TriggerError::SiteConfigNotFound(site_config_id))?;
        if !config.enabled {
            return Err(TriggerError::ConfigDisabled(site_config_id));
        }

        let job = self
            .jobs
            .create(&CrawlJob::new_pending(site_config_id, triggered_by))
            .await?;

        // 入队失败时任务仍为 pending，重启时会被重新投递
        self.queue
            .enqueue(JobDescriptor {
                job_id: job.id,
                site_config_id,
            })
            .await?;

        info!(
            job_id = %job.id,
            site_config_id = %site_config_id,
            domain = %config.domain,
            triggered_by,
            "Crawl job enqueued"
        );
        Ok(job)
    }

    /// 取消任务
    ///
    /// pending 任务直接置为 cancelled；运行中的任务设置协作式取消标志。
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<CancelOutcome, TriggerError> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or(TriggerError::JobNotFound(job_id))?;

        if job.status.is_terminal() {
            return Ok(CancelOutcome::AlreadyFinished(job.status));
        }
        if job.status == CrawlJobStatus::Pending && self.jobs.cancel_pending(job_id).await? {
            info!(job_id = %job_id, "Pending crawl job cancelled");
            return Ok(CancelOutcome::Cancelled);
        }

        // 任务已被 worker 领取
        if self.cancellation.cancel(job_id) {
            info!(job_id = %job_id, "Cancellation requested for running crawl job");
            return Ok(CancelOutcome::CancellationRequested);
        }

        match self.jobs.find_by_id(job_id).await? {
            Some(job) if job.status.is_terminal() => Ok(CancelOutcome::AlreadyFinished(job.status)),
            Some(_) => {
                warn!(job_id = %job_id, "Running job has no local cancellation flag");
                Err(TriggerError::NotCancellable(job_id))
            }
            None => Err(TriggerError::JobNotFound(job_id)),
        }
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<CrawlJob, TriggerError> {
        self.jobs
            .find_by_id(job_id)
            .await?
            .ok_or(TriggerError::JobNotFound(job_id))
    }

    /// 按顺序号返回任务的全部日志
    pub async fn job_logs(&self, job_id: Uuid) -> Result<Vec<CrawlLogEntry>, TriggerError> {
        if self.jobs.find_by_id(job_id).await?.is_none() {
            return Err(TriggerError::JobNotFound(job_id));
        }
        Ok(self.jobs.list_logs(job_id).await?)
    }

    /// 全局爬取概况
    pub async fn stats_summary(&self) -> Result<CrawlStatsSummary, TriggerError> {
        let configs = self.site_configs.list().await?;
        let now = Utc::now();
        let all = self.jobs.status_counts(None, None).await?;

        Ok(CrawlStatsSummary {
            total_configs: configs.len() as u64,
            active_configs: configs.iter().filter(|c| c.enabled).count() as u64,
            running_jobs: all.running,
            pending_jobs: all.pending,
            jobs_24h: self
                .jobs
                .status_counts(None, Some(now - Duration::hours(24)))
                .await?,
            jobs_7d: self
                .jobs
                .status_counts(None, Some(now - Duration::days(7)))
                .await?,
        })
    }

    /// 站点配置最近 `days` 天（默认 7 天）的运行表现
    pub async fn config_performance(
        &self,
        site_config_id: Uuid,
        days: Option<u32>,
    ) -> Result<ConfigPerformance, TriggerError> {
        if self.site_configs.find_by_id(site_config_id).await?.is_none() {
            return Err(TriggerError::SiteConfigNotFound(site_config_id));
        }
        let days = days.unwrap_or(DEFAULT_PERFORMANCE_DAYS);
        let since = Utc::now() - Duration::days(i64::from(days));

        let jobs = self
            .jobs
            .status_counts(Some(site_config_id), Some(since))
            .await?;
        let totals = self.jobs.output_totals(site_config_id, since).await?;

        Ok(ConfigPerformance {
            site_config_id,
            days,
            success_rate: success_rate(&jobs),
            jobs,
            totals,
        })
    }

    /// 站点配置最近的任务，按创建时间倒序
    pub async fn list_jobs_for_config(
        &self,
        site_config_id: Uuid,
        limit: Option<u64>,
    ) -> Result<Vec<CrawlJob>, TriggerError> {
        if self.site_configs.find_by_id(site_config_id).await?.is_none() {
            return Err(TriggerError::SiteConfigNotFound(site_config_id));
        }
        Ok(self
            .jobs
            .list_by_site_config(site_config_id, limit.unwrap_or(DEFAULT_JOB_LIST_LIMIT))
            .await?)
    }
}

#[cfg(test)]
#[path = "crawl_use_case_test.rs"]
mod tests;
