// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// 准入结果
///
/// 被拒绝不是错误，而是调度信号：调用方应等待 `retry_after` 后再次申请
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Admission {
    /// 是否允许本次请求
    pub allowed: bool,
    /// 被拒绝时建议的等待时间，由窗口内最早的记录计算得出
    pub retry_after: Duration,
}

impl Admission {
    /// 允许通过
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after: Duration::ZERO,
        }
    }

    /// 拒绝并给出建议等待时间
    pub fn denied(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after,
        }
    }
}

/// 按域名的滑动窗口准入控制
///
/// 每次准入都在共享计数存储中以域名为键记录一条带时间戳的条目，
/// 计数检查与记录必须是同一个原子操作。
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// 申请一次请求准入
    ///
    /// # 参数
    ///
    /// * `domain` - 目标域名
    /// * `requests_per_minute` - 该域名在配置中的每分钟配额
    ///
    /// # 返回值
    ///
    /// * `Ok(Admission)` - 准入结果
    /// * `Err(RateLimitingError)` - 计数存储不可用
    async fn admit(
        &self,
        domain: &str,
        requests_per_minute: u32,
    ) -> Result<Admission, RateLimitingError>;

    /// 实现名称，用于日志
    fn name(&self) -> &'static str;
}

/// 限流错误类型
#[derive(Debug, thiserror::Error)]
pub enum RateLimitingError {
    #[error("Redis连接错误: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("计数存储超时")]
    Timeout,

    #[error("配置错误: {0}")]
    ConfigurationError(String),
}
