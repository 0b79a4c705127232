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

use crate::domain::models::crawl_job::{
    CrawlJob, CrawlJobStatus, CrawlLogEntry, CrawlStats, JobOutputTotals, JobStatusCounts,
    LogOutcome,
};
use crate::domain::repositories::crawl_job_repository::{CrawlJobRepository, RepositoryError};
use crate::infrastructure::database::entities::{crawl_job as job_entity, crawl_log as log_entity};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 爬取任务仓库实现
///
/// 基于SeaORM实现的任务追踪器，状态转换均为带状态条件的原子更新
#[derive(Clone)]
pub struct CrawlJobRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl CrawlJobRepositoryImpl {
    /// 创建新的任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn to_fixed(at: DateTime<Utc>) -> DateTime<FixedOffset> {
    at.into()
}

#[derive(Debug, FromQueryResult)]
struct StatusCountRow {
    status: String,
    count: i64,
}

#[derive(Debug, FromQueryResult)]
struct OutputTotalsRow {
    pages_fetched: Option<i64>,
    leads_found: Option<i64>,
    leads_updated: Option<i64>,
}

impl TryFrom<job_entity::Model> for CrawlJob {
    type Error = RepositoryError;

    fn try_from(model: job_entity::Model) -> Result<Self, Self::Error> {
        let status = model.status.parse().map_err(|_| {
            RepositoryError::InvalidData(format!("unknown crawl job status '{}'", model.status))
        })?;

        Ok(Self {
            id: model.id,
            site_config_id: model.site_config_id,
            status,
            triggered_by: model.triggered_by,
            stats: CrawlStats {
                pages_fetched: model.pages_fetched,
                leads_found: model.leads_found,
                leads_updated: model.leads_updated,
                error_count: model.error_count,
            },
            error_message: model.error_message,
            started_at: model.started_at.map(Into::into),
            finished_at: model.finished_at.map(Into::into),
            created_at: model.created_at.into(),
        })
    }
}

impl TryFrom<log_entity::Model> for CrawlLogEntry {
    type Error = RepositoryError;

    fn try_from(model: log_entity::Model) -> Result<Self, Self::Error> {
        let outcome: LogOutcome = model.outcome.parse().map_err(|_| {
            RepositoryError::InvalidData(format!("unknown log outcome '{}'", model.outcome))
        })?;

        Ok(Self {
            id: model.id,
            job_id: model.job_id,
            sequence: model.sequence,
            url: model.url,
            outcome,
            http_status: model.http_status.and_then(|s| u16::try_from(s).ok()),
            error_kind: model.error_kind,
            error: model.error,
            content_type: model.content_type,
            retries: u32::try_from(model.retries).unwrap_or_default(),
            elapsed_ms: u64::try_from(model.elapsed_ms).unwrap_or_default(),
            leads_found: model.leads_found,
            leads_updated: model.leads_updated,
            created_at: model.created_at.into(),
        })
    }
}

#[async_trait]
impl CrawlJobRepository for CrawlJobRepositoryImpl {
    async fn create(&self, job: &CrawlJob) -> Result<CrawlJob, RepositoryError> {
        let model = job_entity::ActiveModel {
            id: Set(job.id),
            site_config_id: Set(job.site_config_id),
            status: Set(job.status.to_string()),
            triggered_by: Set(job.triggered_by.clone()),
            pages_fetched: Set(job.stats.pages_fetched),
            leads_found: Set(job.stats.leads_found),
            leads_updated: Set(job.stats.leads_updated),
            error_count: Set(job.stats.error_count),
            error_message: Set(job.error_message.clone()),
            started_at: Set(job.started_at.map(to_fixed)),
            finished_at: Set(job.finished_at.map(to_fixed)),
            created_at: Set(to_fixed(job.created_at)),
        };

        model.insert(self.db.as_ref()).await?;
        Ok(job.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CrawlJob>, RepositoryError> {
        let model = job_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        model.map(CrawlJob::try_from).transpose()
    }

    async fn mark_running(
        &self,
        id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(CrawlJobStatus::Running.to_string()),
            )
            .col_expr(job_entity::Column::StartedAt, Expr::value(to_fixed(started_at)))
            .filter(job_entity::Column::Id.eq(id))
            .filter(job_entity::Column::Status.eq(CrawlJobStatus::Pending.to_string()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn update_stats(&self, id: Uuid, stats: &CrawlStats) -> Result<(), RepositoryError> {
        job_entity::Entity::update_many()
            .col_expr(job_entity::Column::PagesFetched, Expr::value(stats.pages_fetched))
            .col_expr(job_entity::Column::LeadsFound, Expr::value(stats.leads_found))
            .col_expr(job_entity::Column::LeadsUpdated, Expr::value(stats.leads_updated))
            .col_expr(job_entity::Column::ErrorCount, Expr::value(stats.error_count))
            .filter(job_entity::Column::Id.eq(id))
            .filter(job_entity::Column::Status.eq(CrawlJobStatus::Running.to_string()))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn finish(
        &self,
        id: Uuid,
        status: CrawlJobStatus,
        stats: &CrawlStats,
        error_message: Option<String>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = job_entity::Entity::update_many()
            .col_expr(job_entity::Column::Status, Expr::value(status.to_string()))
            .col_expr(job_entity::Column::PagesFetched, Expr::value(stats.pages_fetched))
            .col_expr(job_entity::Column::LeadsFound, Expr::value(stats.leads_found))
            .col_expr(job_entity::Column::LeadsUpdated, Expr::value(stats.leads_updated))
            .col_expr(job_entity::Column::ErrorCount, Expr::value(stats.error_count))
            .col_expr(job_entity::Column::ErrorMessage, Expr::value(error_message))
            .col_expr(job_entity::Column::FinishedAt, Expr::value(to_fixed(finished_at)))
            .filter(job_entity::Column::Id.eq(id))
            .filter(job_entity::Column::Status.eq(CrawlJobStatus::Running.to_string()))
            .exec(self.db.as_ref())
            .await?;

        // Terminal jobs are never reopened
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn cancel_pending(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(CrawlJobStatus::Cancelled.to_string()),
            )
            .col_expr(job_entity::Column::FinishedAt, Expr::value(to_fixed(Utc::now())))
            .filter(job_entity::Column::Id.eq(id))
            .filter(job_entity::Column::Status.eq(CrawlJobStatus::Pending.to_string()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn append_log(&self, entry: &CrawlLogEntry) -> Result<(), RepositoryError> {
        let model = log_entity::ActiveModel {
            id: Set(entry.id),
            job_id: Set(entry.job_id),
            sequence: Set(entry.sequence),
            url: Set(entry.url.clone()),
            outcome: Set(entry.outcome.to_string()),
            http_status: Set(entry.http_status.map(i32::from)),
            error_kind: Set(entry.error_kind.clone()),
            error: Set(entry.error.clone()),
            content_type: Set(entry.content_type.clone()),
            retries: Set(i32::try_from(entry.retries).unwrap_or(i32::MAX)),
            elapsed_ms: Set(i64::try_from(entry.elapsed_ms).unwrap_or(i64::MAX)),
            leads_found: Set(entry.leads_found),
            leads_updated: Set(entry.leads_updated),
            created_at: Set(to_fixed(entry.created_at)),
        };

        model.insert(self.db.as_ref()).await?;
        Ok(())
    }

    async fn list_logs(&self, job_id: Uuid) -> Result<Vec<CrawlLogEntry>, RepositoryError> {
        let models = log_entity::Entity::find()
            .filter(log_entity::Column::JobId.eq(job_id))
            .order_by_asc(log_entity::Column::Sequence)
            .all(self.db.as_ref())
            .await?;

        models.into_iter().map(CrawlLogEntry::try_from).collect()
    }

    async fn find_by_status(
        &self,
        status: CrawlJobStatus,
    ) -> Result<Vec<CrawlJob>, RepositoryError> {
        let models = job_entity::Entity::find()
            .filter(job_entity::Column::Status.eq(status.to_string()))
            .order_by_asc(job_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        models.into_iter().map(CrawlJob::try_from).collect()
    }

    async fn list_by_site_config(
        &self,
        site_config_id: Uuid,
        limit: u64,
    ) -> Result<Vec<CrawlJob>, RepositoryError> {
        let models = job_entity::Entity::find()
            .filter(job_entity::Column::SiteConfigId.eq(site_config_id))
            .order_by_desc(job_entity::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        models.into_iter().map(CrawlJob::try_from).collect()
    }

    async fn has_active_job(&self, site_config_id: Uuid) -> Result<bool, RepositoryError> {
        let count = job_entity::Entity::find()
            .filter(job_entity::Column::SiteConfigId.eq(site_config_id))
            .filter(job_entity::Column::Status.is_in([
                CrawlJobStatus::Pending.to_string(),
                CrawlJobStatus::Running.to_string(),
            ]))
            .count(self.db.as_ref())
            .await?;

        Ok(count > 0)
    }

    async fn fail_interrupted(&self, reason: &str) -> Result<u64, RepositoryError> {
        let result = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(CrawlJobStatus::Failed.to_string()),
            )
            .col_expr(job_entity::Column::ErrorMessage, Expr::value(reason.to_string()))
            .col_expr(job_entity::Column::FinishedAt, Expr::value(to_fixed(Utc::now())))
            .filter(job_entity::Column::Status.eq(CrawlJobStatus::Running.to_string()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }

    async fn status_counts(
        &self,
        site_config_id: Option<Uuid>,
        since: Option<DateTime<Utc>>,
    ) -> Result<JobStatusCounts, RepositoryError> {
        let mut select = job_entity::Entity::find()
            .select_only()
            .column(job_entity::Column::Status)
            .column_as(job_entity::Column::Id.count(), "count");
        if let Some(site_config_id) = site_config_id {
            select = select.filter(job_entity::Column::SiteConfigId.eq(site_config_id));
        }
        if let Some(since) = since {
            select = select.filter(job_entity::Column::CreatedAt.gte(to_fixed(since)));
        }

        let rows = select
            .group_by(job_entity::Column::Status)
            .into_model::<StatusCountRow>()
            .all(self.db.as_ref())
            .await?;

        let mut counts = JobStatusCounts::default();
        for row in rows {
            let status: CrawlJobStatus = row.status.parse().map_err(|_| {
                RepositoryError::InvalidData(format!("unknown crawl job status '{}'", row.status))
            })?;
            counts.add(status, u64::try_from(row.count).unwrap_or_default());
        }
        Ok(counts)
    }

    async fn output_totals(
        &self,
        site_config_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<JobOutputTotals, RepositoryError> {
        let row = job_entity::Entity::find()
            .select_only()
            .column_as(job_entity::Column::PagesFetched.sum(), "pages_fetched")
            .column_as(job_entity::Column::LeadsFound.sum(), "leads_found")
            .column_as(job_entity::Column::LeadsUpdated.sum(), "leads_updated")
            .filter(job_entity::Column::SiteConfigId.eq(site_config_id))
            .filter(job_entity::Column::CreatedAt.gte(to_fixed(since)))
            .filter(job_entity::Column::Status.is_in([
                CrawlJobStatus::Completed.to_string(),
                CrawlJobStatus::Partial.to_string(),
            ]))
            .into_model::<OutputTotalsRow>()
            .one(self.db.as_ref())
            .await?;

        // 没有匹配行时 SUM 为 NULL
        Ok(row
            .map(|row| JobOutputTotals {
                pages_fetched: row.pages_fetched.unwrap_or_default(),
                leads_found: row.leads_found.unwrap_or_default(),
                leads_updated: row.leads_updated.unwrap_or_default(),
            })
            .unwrap_or_default())
    }

    async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = log_entity::Entity::delete_many()
            .filter(log_entity::Column::CreatedAt.lt(to_fixed(cutoff)))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }
}
