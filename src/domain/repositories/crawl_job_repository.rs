// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_job::{
    CrawlJob, CrawlJobStatus, CrawlLogEntry, CrawlStats, JobOutputTotals, JobStatusCounts,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 存储的数据无法还原为领域模型
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

/// 爬取任务仓库特质
///
/// 任务追踪器：创建与更新运行记录，并为每次抓取尝试追加日志条目
#[async_trait]
pub trait CrawlJobRepository: Send + Sync {
    /// 创建任务
    async fn create(&self, job: &CrawlJob) -> Result<CrawlJob, RepositoryError>;

    /// 根据ID查找任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<CrawlJob>, RepositoryError>;

    /// 将待处理任务标记为运行中
    ///
    /// 条件更新：只有状态仍为 pending 时才会转换
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 转换成功，调用方获得该任务的执行权
    /// * `Ok(false)` - 任务已不是 pending（被取消或已被其他 worker 领取）
    async fn mark_running(
        &self,
        id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// 刷新运行中任务的统计
    async fn update_stats(&self, id: Uuid, stats: &CrawlStats) -> Result<(), RepositoryError>;

    /// 将运行中的任务置为终态
    ///
    /// # 参数
    ///
    /// * `id` - 任务ID
    /// * `status` - 终态
    /// * `stats` - 最终统计
    /// * `error_message` - 失败或部分完成的原因
    /// * `finished_at` - 结束时间
    async fn finish(
        &self,
        id: Uuid,
        status: CrawlJobStatus,
        stats: &CrawlStats,
        error_message: Option<String>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// 取消尚未开始的任务
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 任务从 pending 转为 cancelled
    /// * `Ok(false)` - 任务已不是 pending
    async fn cancel_pending(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// 追加日志条目
    async fn append_log(&self, entry: &CrawlLogEntry) -> Result<(), RepositoryError>;

    /// 按顺序号列出任务日志
    async fn list_logs(&self, job_id: Uuid) -> Result<Vec<CrawlLogEntry>, RepositoryError>;

    /// 查找指定状态的任务，按创建时间排序
    async fn find_by_status(&self, status: CrawlJobStatus)
        -> Result<Vec<CrawlJob>, RepositoryError>;

    /// 列出某个站点配置最近的任务
    async fn list_by_site_config(
        &self,
        site_config_id: Uuid,
        limit: u64,
    ) -> Result<Vec<CrawlJob>, RepositoryError>;

    /// 站点配置是否有待处理或运行中的任务
    async fn has_active_job(&self, site_config_id: Uuid) -> Result<bool, RepositoryError>;

    /// 将遗留的运行中任务标记为失败（进程崩溃后恢复）
    async fn fail_interrupted(&self, reason: &str) -> Result<u64, RepositoryError>;

    /// 按状态统计任务数
    ///
    /// # 参数
    ///
    /// * `site_config_id` - 只统计该配置的任务，None 表示全部
    /// * `since` - 只统计此时间之后创建的任务，None 表示不限
    async fn status_counts(
        &self,
        site_config_id: Option<Uuid>,
        since: Option<DateTime<Utc>>,
    ) -> Result<JobStatusCounts, RepositoryError>;

    /// 累计某个配置在 `since` 之后以 completed 或 partial 结束的任务产出
    async fn output_totals(
        &self,
        site_config_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<JobOutputTotals, RepositoryError>;

    /// 删除早于指定时间的日志条目
    async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;
}
