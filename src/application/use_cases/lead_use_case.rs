// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::{
    models::lead::{Lead, LeadQuery, LeadSourceCount},
    repositories::{crawl_job_repository::RepositoryError, lead_repository::LeadRepository},
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// 线索统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadStats {
    pub total: u64,
    /// 有联系邮箱的线索数
    pub with_email: u64,
    pub by_source: Vec<LeadSourceCount>,
}

/// 线索查询用例
pub struct LeadUseCase {
    leads: Arc<dyn LeadRepository>,
}

impl LeadUseCase {
    pub fn new(leads: Arc<dyn LeadRepository>) -> Self {
        Self { leads }
    }

    /// 按来源、标签、关键字、邮箱和创建时间筛选线索，分页大小由存储层限制
    pub async fn query(&self, query: &LeadQuery) -> Result<Vec<Lead>, RepositoryError> {
        self.leads.query(query).await
    }

    /// 获取单条线索，不存在时返回 `RepositoryError::NotFound`
    pub async fn get(&self, id: Uuid) -> Result<Lead, RepositoryError> {
        self.leads
            .find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    pub async fn stats(&self) -> Result<LeadStats, RepositoryError> {
        Ok(LeadStats {
            total: self.leads.count().await?,
            with_email: self.leads.count_with_email().await?,
            by_source: self.leads.count_by_source().await?,
        })
    }
}
