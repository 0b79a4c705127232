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

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// 抓取错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// 连接或读取超时
    Timeout,
    /// 连接失败、连接被重置
    Connection,
    /// 5xx 状态码
    ServerError,
    /// 429 状态码
    TooManyRequests,
    /// 429 以外的 4xx 状态码
    ClientError,
    /// 请求本身无效（URL、请求头）
    InvalidRequest,
    /// 其他错误，例如响应体解码失败
    Other,
}

impl FetchErrorKind {
    /// 判断错误是否可在抓取器内部重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchErrorKind::Timeout
                | FetchErrorKind::Connection
                | FetchErrorKind::ServerError
                | FetchErrorKind::TooManyRequests
        )
    }

    /// 判断重试耗尽后是否仍值得在页面级别再试
    ///
    /// 5xx 在抓取器内部已经重试过，视为站点故障，不再重复
    pub fn is_page_recoverable(&self) -> bool {
        matches!(
            self,
            FetchErrorKind::Timeout | FetchErrorKind::Connection | FetchErrorKind::TooManyRequests
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::Connection => "connection",
            FetchErrorKind::ServerError => "server_error",
            FetchErrorKind::TooManyRequests => "too_many_requests",
            FetchErrorKind::ClientError => "client_error",
            FetchErrorKind::InvalidRequest => "invalid_request",
            FetchErrorKind::Other => "other",
        }
    }

    /// 按状态码分类，2xx/3xx 返回 None
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            429 => Some(FetchErrorKind::TooManyRequests),
            400..=499 => Some(FetchErrorKind::ClientError),
            500..=599 => Some(FetchErrorKind::ServerError),
            _ => None,
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 抓取错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            FetchErrorKind::Timeout
        } else if e.is_connect() {
            FetchErrorKind::Connection
        } else if e.is_builder() {
            FetchErrorKind::InvalidRequest
        } else if let Some(kind) = e.status().and_then(|s| FetchErrorKind::from_status(s.as_u16())) {
            kind
        } else if e.is_request() || e.is_body() {
            FetchErrorKind::Connection
        } else {
            FetchErrorKind::Other
        };
        FetchError::new(kind, e.to_string())
    }
}

/// 抓取请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// 目标URL
    pub url: String,
    /// 请求头
    pub headers: HashMap<String, String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// 抓取结果
///
/// 所有结果都是结构化的，抓取器从不向调用方返回 Err
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// 最终请求的URL
    pub url: String,
    /// 最后一次收到的HTTP状态码
    pub status: Option<u16>,
    /// 成功时的响应体
    pub body: Option<String>,
    /// 内容类型
    pub content_type: Option<String>,
    /// 失败原因
    pub error: Option<FetchError>,
    /// 实际尝试次数
    pub attempts: u32,
    /// 总耗时（包含退避）
    pub elapsed: Duration,
}

impl FetchOutcome {
    /// 是否成功取得响应体
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.body.is_some()
    }

    /// 首次请求之外的重试次数
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// 重试准入
///
/// 抓取器在每次内部重试之前询问调用方，重试请求因此同样经过限流
#[async_trait]
pub trait RetryGate: Send + Sync {
    /// 返回 false 时放弃剩余重试，直接返回最后一次失败
    async fn admit_retry(&self) -> bool;
}

/// 总是放行的重试准入
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

#[async_trait]
impl RetryGate for OpenGate {
    async fn admit_retry(&self) -> bool {
        true
    }
}

/// 抓取器特质
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// 执行一次带超时和重试的HTTP GET
    ///
    /// 首次请求的准入由调用方负责，之后的每次重试都要先通过 `gate`
    async fn fetch(&self, request: &FetchRequest, gate: &dyn RetryGate) -> FetchOutcome;

    /// 抓取器名称
    fn name(&self) -> &'static str;
}
