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

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    application::{
        dto::site_config_request::{JobListQuery, PerformanceQuery},
        use_cases::crawl_use_case::CrawlUseCase,
    },
    presentation::errors::AppError,
};

/// 手动触发的任务的触发者标识
const API_TRIGGER: &str = "api";

/// 触发一次爬取，任务在后台执行
pub async fn trigger_crawl(
    Extension(use_case): Extension<Arc<CrawlUseCase>>,
    Path(site_config_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let job = use_case.trigger_crawl(site_config_id, API_TRIGGER).await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// 站点配置最近的任务
pub async fn list_config_jobs(
    Extension(use_case): Extension<Arc<CrawlUseCase>>,
    Path(site_config_id): Path<Uuid>,
    Query(query): Query<JobListQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;
    Ok(Json(
        use_case
            .list_jobs_for_config(site_config_id, query.limit)
            .await?,
    ))
}

/// 站点配置最近一段时间的运行表现
pub async fn config_performance(
    Extension(use_case): Extension<Arc<CrawlUseCase>>,
    Path(site_config_id): Path<Uuid>,
    Query(query): Query<PerformanceQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;
    Ok(Json(
        use_case
            .config_performance(site_config_id, query.days)
            .await?,
    ))
}

/// 全局爬取概况
pub async fn crawl_stats(
    Extension(use_case): Extension<Arc<CrawlUseCase>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(use_case.stats_summary().await?))
}

/// 获取任务详情
pub async fn get_job(
    Extension(use_case): Extension<Arc<CrawlUseCase>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(use_case.get_job(job_id).await?))
}

/// 获取任务的抓取日志
pub async fn get_job_logs(
    Extension(use_case): Extension<Arc<CrawlUseCase>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(use_case.job_logs(job_id).await?))
}

/// 取消任务
pub async fn cancel_job(
    Extension(use_case): Extension<Arc<CrawlUseCase>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(use_case.cancel_job(job_id).await?))
}
