// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::domain::repositories::crawl_job_repository::RepositoryError;
use crate::domain::services::crawl_pipeline::PipelineError;
use crate::queue::job_queue::QueueError;

/// Worker错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("仓库错误: {0}")]
    RepositoryError(#[from] RepositoryError),

    #[error("队列错误: {0}")]
    QueueError(#[from] QueueError),

    #[error("管道错误: {0}")]
    PipelineError(#[from] PipelineError),

    #[error("内部错误: {0}")]
    InternalError(String),
}
