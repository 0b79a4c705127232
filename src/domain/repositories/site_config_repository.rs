// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::crawl_job_repository::RepositoryError;
use crate::domain::models::site_config::SiteConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 站点配置仓库特质
#[async_trait]
pub trait SiteConfigRepository: Send + Sync {
    /// 创建站点配置
    async fn create(&self, config: &SiteConfig) -> Result<SiteConfig, RepositoryError>;

    /// 根据ID查找站点配置
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SiteConfig>, RepositoryError>;

    /// 列出全部站点配置
    async fn list(&self) -> Result<Vec<SiteConfig>, RepositoryError>;

    /// 读取当前的启用标志
    ///
    /// 管道在每页之前调用，用于发现运行中被禁用的配置
    async fn is_enabled(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// 设置启用标志
    async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<(), RepositoryError>;

    /// 查找已启用且到期需要调度的配置
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<SiteConfig>, RepositoryError>;

    /// 记录最近一次爬取时间
    async fn touch_last_crawl(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError>;
}
