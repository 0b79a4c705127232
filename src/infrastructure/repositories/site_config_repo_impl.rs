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

use crate::domain::models::site_config::SiteConfig;
use crate::domain::repositories::crawl_job_repository::RepositoryError;
use crate::domain::repositories::site_config_repository::SiteConfigRepository;
use crate::infrastructure::database::entities::site_config as site_config_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 站点配置仓库实现
#[derive(Clone)]
pub struct SiteConfigRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl SiteConfigRepositoryImpl {
    /// 创建新的站点配置仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<site_config_entity::Model> for SiteConfig {
    type Error = RepositoryError;

    fn try_from(model: site_config_entity::Model) -> Result<Self, Self::Error> {
        let start_urls: Vec<String> = serde_json::from_value(model.start_urls)
            .map_err(|e| RepositoryError::InvalidData(format!("start_urls: {}", e)))?;

        Ok(Self {
            id: model.id,
            name: model.name,
            domain: model.domain,
            source_type: model.source_type,
            filters: model.filters,
            start_urls,
            requests_per_minute: u32::try_from(model.requests_per_minute).unwrap_or(0),
            max_pages: u32::try_from(model.max_pages).unwrap_or(0),
            enabled: model.enabled,
            crawl_interval_hours: u32::try_from(model.crawl_interval_hours).unwrap_or(0),
            last_crawl_at: model.last_crawl_at.map(Into::into),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }
}

impl From<&SiteConfig> for site_config_entity::ActiveModel {
    fn from(config: &SiteConfig) -> Self {
        Self {
            id: Set(config.id),
            name: Set(config.name.clone()),
            domain: Set(config.domain.clone()),
            source_type: Set(config.source_type.clone()),
            filters: Set(config.filters.clone()),
            start_urls: Set(serde_json::json!(config.start_urls)),
            requests_per_minute: Set(i32::try_from(config.requests_per_minute).unwrap_or(i32::MAX)),
            max_pages: Set(i32::try_from(config.max_pages).unwrap_or(i32::MAX)),
            enabled: Set(config.enabled),
            crawl_interval_hours: Set(
                i32::try_from(config.crawl_interval_hours).unwrap_or(i32::MAX),
            ),
            last_crawl_at: Set(config.last_crawl_at.map(Into::into)),
            created_at: Set(config.created_at.into()),
            updated_at: Set(config.updated_at.into()),
        }
    }
}

#[async_trait]
impl SiteConfigRepository for SiteConfigRepositoryImpl {
    async fn create(&self, config: &SiteConfig) -> Result<SiteConfig, RepositoryError> {
        let model: site_config_entity::ActiveModel = config.into();
        let inserted = model.insert(self.db.as_ref()).await?;
        SiteConfig::try_from(inserted)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SiteConfig>, RepositoryError> {
        let model = site_config_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        model.map(SiteConfig::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<SiteConfig>, RepositoryError> {
        let models = site_config_entity::Entity::find()
            .order_by_asc(site_config_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        models.into_iter().map(SiteConfig::try_from).collect()
    }

    async fn is_enabled(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let model = site_config_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?;

        Ok(model.enabled)
    }

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<(), RepositoryError> {
        let result = site_config_entity::Entity::update_many()
            .col_expr(site_config_entity::Column::Enabled, Expr::value(enabled))
            .col_expr(
                site_config_entity::Column::UpdatedAt,
                Expr::value(DateTime::<FixedOffset>::from(Utc::now())),
            )
            .filter(site_config_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<SiteConfig>, RepositoryError> {
        // The interval is per row, so the due check runs on the domain model
        let models = site_config_entity::Entity::find()
            .filter(site_config_entity::Column::Enabled.eq(true))
            .order_by_asc(site_config_entity::Column::LastCrawlAt)
            .all(self.db.as_ref())
            .await?;

        let mut due = Vec::new();
        for model in models {
            let config = SiteConfig::try_from(model)?;
            if config.is_due(now) {
                due.push(config);
            }
        }
        Ok(due)
    }

    async fn touch_last_crawl(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let at: DateTime<FixedOffset> = at.into();
        site_config_entity::Entity::update_many()
            .col_expr(site_config_entity::Column::LastCrawlAt, Expr::value(at))
            .col_expr(site_config_entity::Column::UpdatedAt, Expr::value(at))
            .filter(site_config_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }
}
