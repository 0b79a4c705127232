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
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    application::{
        dto::site_config_request::{CreateSiteConfigDto, SetEnabledDto},
        use_cases::site_config_use_case::SiteConfigUseCase,
    },
    presentation::errors::AppError,
};

/// 创建站点配置
pub async fn create_site_config(
    Extension(use_case): Extension<Arc<SiteConfigUseCase>>,
    Json(payload): Json<CreateSiteConfigDto>,
) -> Result<impl IntoResponse, AppError> {
    let config = use_case.create(payload).await?;
    Ok((StatusCode::CREATED, Json(config)))
}

/// 列出全部站点配置
pub async fn list_site_configs(
    Extension(use_case): Extension<Arc<SiteConfigUseCase>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(use_case.list().await?))
}

pub async fn get_site_config(
    Extension(use_case): Extension<Arc<SiteConfigUseCase>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(use_case.get(id).await?))
}

/// 启用或停用站点配置
pub async fn set_site_config_enabled(
    Extension(use_case): Extension<Arc<SiteConfigUseCase>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetEnabledDto>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(use_case.set_enabled(id, payload.enabled).await?))
}
