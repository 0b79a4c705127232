// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::crawl_job_repository::RepositoryError;
use crate::domain::models::lead::{Lead, LeadCandidate, LeadQuery, LeadSourceCount, UpsertOutcome};
use async_trait::async_trait;
use uuid::Uuid;

/// 线索仓库特质
///
/// 线索存储：按 (profile_url, source_domain) 去重并写入候选记录
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// 插入或更新候选线索
    ///
    /// 每个候选在单个事务内完成：先尝试条件插入，
    /// 唯一约束冲突时回退为按同一自然键更新。并发任务写入同一线索时，
    /// 只有一个插入生效，其余的变为更新。
    ///
    /// # 返回值
    ///
    /// * `Ok(UpsertOutcome)` - 线索ID以及是否新建
    /// * `Err(RepositoryError)` - 写入失败
    async fn upsert(&self, candidate: &LeadCandidate) -> Result<UpsertOutcome, RepositoryError>;

    /// 根据自然键查找线索
    async fn find_by_natural_key(
        &self,
        profile_url: &str,
        source_domain: &str,
    ) -> Result<Option<Lead>, RepositoryError>;

    /// 根据ID查找线索
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Lead>, RepositoryError>;

    /// 按条件列出线索，最近更新的在前
    async fn query(&self, query: &LeadQuery) -> Result<Vec<Lead>, RepositoryError>;

    /// 线索总数
    async fn count(&self) -> Result<u64, RepositoryError>;

    /// 有联系邮箱的线索数
    async fn count_with_email(&self) -> Result<u64, RepositoryError>;

    /// 按来源域名统计线索数量
    async fn count_by_source(&self) -> Result<Vec<LeadSourceCount>, RepositoryError>;
}
