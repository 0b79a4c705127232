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
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    application::use_cases::lead_use_case::LeadUseCase, domain::models::lead::LeadQuery,
    presentation::errors::AppError,
};

/// 查询线索
///
/// 支持 `source_domain`、`tag`、`q`、`has_email`、`created_after`、
/// `created_before` 以及 `limit`/`offset`
pub async fn list_leads(
    Extension(use_case): Extension<Arc<LeadUseCase>>,
    Query(query): Query<LeadQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(use_case.query(&query).await?))
}

/// 获取单条线索
pub async fn get_lead(
    Extension(use_case): Extension<Arc<LeadUseCase>>,
    Path(lead_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(use_case.get(lead_id).await?))
}

pub async fn lead_stats(
    Extension(use_case): Extension<Arc<LeadUseCase>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(use_case.stats().await?))
}
