// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::{
    application::dto::site_config_request::CreateSiteConfigDto,
    domain::{
        models::site_config::SiteConfig,
        repositories::{
            crawl_job_repository::RepositoryError, site_config_repository::SiteConfigRepository,
        },
    },
    parsers::registry::ParserRegistry,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use url::Url;
use uuid::Uuid;
use validator::Validate;

#[derive(Error, Debug)]
pub enum SiteConfigUseCaseError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Unknown source type: {0}")]
    UnknownSourceType(String),
    #[error("Site config {0} not found")]
    NotFound(Uuid),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 站点配置用例
pub struct SiteConfigUseCase {
    site_configs: Arc<dyn SiteConfigRepository>,
    parsers: Arc<ParserRegistry>,
}

impl SiteConfigUseCase {
    pub fn new(site_configs: Arc<dyn SiteConfigRepository>, parsers: Arc<ParserRegistry>) -> Self {
        Self {
            site_configs,
            parsers,
        }
    }

    /// 创建站点配置
    ///
    /// 来源类型必须已在解析器注册表中登记，种子URL必须是合法的绝对URL
    pub async fn create(&self, dto: CreateSiteConfigDto) -> Result<SiteConfig, SiteConfigUseCaseError> {
        dto.validate()
            .map_err(|e| SiteConfigUseCaseError::ValidationError(e.to_string()))?;

        if !self.parsers.contains(&dto.source_type) {
            return Err(SiteConfigUseCaseError::UnknownSourceType(dto.source_type));
        }
        for url in &dto.start_urls {
            Url::parse(url).map_err(|e| {
                SiteConfigUseCaseError::ValidationError(format!("start_urls: {}: {}", url, e))
            })?;
        }

        let mut config = SiteConfig::new(
            dto.name,
            dto.domain.trim().to_lowercase(),
            dto.source_type,
            dto.filters,
        );
        config.start_urls = dto.start_urls;
        if let Some(rpm) = dto.requests_per_minute {
            config.requests_per_minute = rpm;
        }
        if let Some(max_pages) = dto.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(hours) = dto.crawl_interval_hours {
            config.crawl_interval_hours = hours;
        }
        if let Some(enabled) = dto.enabled {
            config.enabled = enabled;
        }
        config
            .validate()
            .map_err(SiteConfigUseCaseError::ValidationError)?;

        let created = self.site_configs.create(&config).await?;
        info!(
            site_config_id = %created.id,
            domain = %created.domain,
            source_type = %created.source_type,
            "Site config created"
        );
        Ok(created)
    }

    pub async fn list(&self) -> Result<Vec<SiteConfig>, SiteConfigUseCaseError> {
        Ok(self.site_configs.list().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<SiteConfig, SiteConfigUseCaseError> {
        self.site_configs
            .find_by_id(id)
            .await?
            .ok_or(SiteConfigUseCaseError::NotFound(id))
    }

    /// 启用或停用配置，运行中的任务会在下一页前察觉停用
    pub async fn set_enabled(
        &self,
        id: Uuid,
        enabled: bool,
    ) -> Result<SiteConfig, SiteConfigUseCaseError> {
        self.get(id).await?;
        self.site_configs.set_enabled(id, enabled).await?;
        info!(site_config_id = %id, enabled, "Site config toggled");
        self.get(id).await
    }
}
