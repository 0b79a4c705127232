// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use validator::ValidationErrors;

use crate::application::use_cases::crawl_use_case::TriggerError;
use crate::application::use_cases::site_config_use_case::SiteConfigUseCaseError;
use crate::domain::repositories::crawl_job_repository::RepositoryError;

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if let Some(e) = self.0.downcast_ref::<TriggerError>() {
            return match e {
                TriggerError::SiteConfigNotFound(_) | TriggerError::JobNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                TriggerError::ConfigDisabled(_) | TriggerError::NotCancellable(_) => {
                    StatusCode::CONFLICT
                }
                TriggerError::Repository(_) | TriggerError::Queue(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
        }
        if let Some(e) = self.0.downcast_ref::<SiteConfigUseCaseError>() {
            return match e {
                SiteConfigUseCaseError::ValidationError(_)
                | SiteConfigUseCaseError::UnknownSourceType(_) => StatusCode::BAD_REQUEST,
                SiteConfigUseCaseError::NotFound(_) => StatusCode::NOT_FOUND,
                SiteConfigUseCaseError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        if self.0.downcast_ref::<ValidationErrors>().is_some() {
            return StatusCode::BAD_REQUEST;
        }
        match self.0.downcast_ref::<RepositoryError>() {
            Some(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = self.0.to_string();
        if status.is_server_error() {
            error!(error = %error_message, "Request failed");
        }

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
