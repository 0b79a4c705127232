// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use metrics::counter;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::services::rate_limiting_service::{Admission, RateLimiter, RateLimitingError};
use crate::infrastructure::cache::redis_client::RedisClient;

/// 滑动窗口配置
#[derive(Debug, Clone)]
pub struct SlidingWindowConfig {
    /// Redis键前缀
    pub key_prefix: String,
    /// 窗口长度
    pub window: Duration,
    /// 单次存储操作的超时时间
    pub store_timeout: Duration,
}

impl Default for SlidingWindowConfig {
    fn default() -> Self {
        Self {
            key_prefix: "leadcrawl:ratelimit".to_string(),
            window: Duration::from_secs(60),
            store_timeout: Duration::from_millis(500),
        }
    }
}

/// 基于Redis有序集合的共享滑动窗口限流器
///
/// 清理过期条目、计数、记录新条目在同一个Lua脚本中完成，
/// 并发的抓取者不会同时看到剩余容量。时间取自Redis服务器，
/// 所有worker共享同一个时钟。
pub struct RedisSlidingWindowLimiter {
    redis: RedisClient,
    config: SlidingWindowConfig,
}

const SLIDING_WINDOW_SCRIPT: &str = r#"
    local key = KEYS[1]
    local limit = tonumber(ARGV[1])
    local window = tonumber(ARGV[2])
    local member = ARGV[3]

    local t = redis.call("TIME")
    local now = tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)

    -- 清理窗口外的条目
    redis.call("ZREMRANGEBYSCORE", key, 0, now - window)

    local current = redis.call("ZCARD", key)
    if current < limit then
        redis.call("ZADD", key, now, member)
        redis.call("PEXPIRE", key, window)
        return {1, 0}
    end

    -- 最早的条目离开窗口后才有空位
    local retry_after = window
    local oldest = redis.call("ZRANGE", key, 0, 0, "WITHSCORES")
    if oldest[2] then
        retry_after = tonumber(oldest[2]) + window - now
    end
    if retry_after < 1 then
        retry_after = 1
    end
    return {0, retry_after}
"#;

impl RedisSlidingWindowLimiter {
    pub fn new(redis: RedisClient, config: SlidingWindowConfig) -> Self {
        Self { redis, config }
    }

    /// 构建Redis键
    fn build_redis_key(&self, domain: &str) -> String {
        format!("{}:{}", self.config.key_prefix, domain.to_ascii_lowercase())
    }

    async fn run_script(
        &self,
        key: String,
        requests_per_minute: u32,
    ) -> Result<Vec<i64>, RateLimitingError> {
        let mut conn = self.redis.get_connection().await?;
        let member = Uuid::new_v4().to_string();

        let result: Result<Vec<i64>, redis::RedisError> = redis::Script::new(SLIDING_WINDOW_SCRIPT)
            .key(&key)
            .arg(requests_per_minute)
            .arg(self.config.window.as_millis() as u64)
            .arg(&member)
            .invoke_async(&mut conn)
            .await;

        match result {
            Ok(reply) => Ok(reply),
            Err(e) => {
                // 断开的连接不再复用
                if e.is_io_error() || e.is_unrecoverable_error() {
                    self.redis.reset_connection().await;
                }
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl RateLimiter for RedisSlidingWindowLimiter {
    async fn admit(
        &self,
        domain: &str,
        requests_per_minute: u32,
    ) -> Result<Admission, RateLimitingError> {
        let key = self.build_redis_key(domain);
        let result = tokio::time::timeout(
            self.config.store_timeout,
            self.run_script(key, requests_per_minute),
        )
        .await
        .map_err(|_| RateLimitingError::Timeout)??;

        match result.as_slice() {
            [1, ..] => Ok(Admission::allowed()),
            [0, retry_after_ms] => Ok(Admission::denied(Duration::from_millis(
                (*retry_after_ms).max(1) as u64,
            ))),
            other => Err(RateLimitingError::ConfigurationError(format!(
                "unexpected sliding window reply: {:?}",
                other
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// 进程内滑动窗口限流器
///
/// 只在单个进程内保证配额，用于共享存储长时间不可用时的降级
pub struct LocalSlidingWindowLimiter {
    windows: DashMap<String, Arc<Mutex<VecDeque<Instant>>>>,
    window: Duration,
}

impl LocalSlidingWindowLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            window,
        }
    }
}

impl Default for LocalSlidingWindowLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[async_trait]
impl RateLimiter for LocalSlidingWindowLimiter {
    async fn admit(
        &self,
        domain: &str,
        requests_per_minute: u32,
    ) -> Result<Admission, RateLimitingError> {
        let entries = self
            .windows
            .entry(domain.to_ascii_lowercase())
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone();

        let now = Instant::now();
        let mut entries = entries.lock();
        while let Some(oldest) = entries.front() {
            if now.duration_since(*oldest) >= self.window {
                entries.pop_front();
            } else {
                break;
            }
        }

        if entries.len() < requests_per_minute as usize {
            entries.push_back(now);
            return Ok(Admission::allowed());
        }

        let retry_after = entries
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(self.window);
        Ok(Admission::denied(retry_after.max(Duration::from_millis(1))))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// 总是允许的限流器
pub struct AllowAllRateLimiter;

#[async_trait]
impl RateLimiter for AllowAllRateLimiter {
    async fn admit(
        &self,
        _domain: &str,
        _requests_per_minute: u32,
    ) -> Result<Admission, RateLimitingError> {
        Ok(Admission::allowed())
    }

    fn name(&self) -> &'static str {
        "allow_all"
    }
}

/// 故障放行的限流器
///
/// 主限流器（共享存储）出错时记录日志并放行请求。
/// 配置了 `fail_open_max` 时，存储不可用持续超过该时长后
/// 改用进程内滑动窗口，直到存储恢复。
pub struct FailOpenRateLimiter {
    primary: Arc<dyn RateLimiter>,
    fallback: Arc<dyn RateLimiter>,
    degraded: Arc<dyn RateLimiter>,
    fail_open_max: Option<Duration>,
    outage_since: Mutex<Option<Instant>>,
}

impl FailOpenRateLimiter {
    /// 创建故障放行限流器
    ///
    /// # 参数
    ///
    /// * `primary` - 共享存储限流器
    /// * `fail_open_max` - 允许放行的最长故障时间，None 表示不限
    /// * `window` - 降级窗口长度
    pub fn new(primary: Arc<dyn RateLimiter>, fail_open_max: Option<Duration>, window: Duration) -> Self {
        Self {
            primary,
            fallback: Arc::new(AllowAllRateLimiter),
            degraded: Arc::new(LocalSlidingWindowLimiter::new(window)),
            fail_open_max,
            outage_since: Mutex::new(None),
        }
    }

    /// 当前故障已持续的时间
    pub fn outage_duration(&self) -> Option<Duration> {
        self.outage_since.lock().map(|since| since.elapsed())
    }
}

#[async_trait]
impl RateLimiter for FailOpenRateLimiter {
    async fn admit(
        &self,
        domain: &str,
        requests_per_minute: u32,
    ) -> Result<Admission, RateLimitingError> {
        let err = match self.primary.admit(domain, requests_per_minute).await {
            Ok(admission) => {
                if let Some(since) = self.outage_since.lock().take() {
                    info!(
                        limiter = self.primary.name(),
                        outage_ms = since.elapsed().as_millis() as u64,
                        "Rate limit store recovered"
                    );
                }
                return Ok(admission);
            }
            Err(e) => e,
        };

        let outage = {
            let mut since = self.outage_since.lock();
            since.get_or_insert_with(Instant::now).elapsed()
        };

        match self.fail_open_max {
            Some(max) if outage >= max => {
                error!(
                    limiter = self.primary.name(),
                    domain,
                    outage_secs = outage.as_secs(),
                    error = %err,
                    "Rate limit store unavailable beyond fail-open limit, enforcing in-process window"
                );
                counter!("rate_limit_degraded_total").increment(1);
                self.degraded.admit(domain, requests_per_minute).await
            }
            _ => {
                warn!(
                    limiter = self.primary.name(),
                    domain,
                    error = %err,
                    "Rate limit store unavailable, failing open"
                );
                counter!("rate_limit_fail_open_total").increment(1);
                self.fallback.admit(domain, requests_per_minute).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "fail_open"
    }
}

#[cfg(test)]
#[path = "rate_limiting_service_impl_test.rs"]
mod tests;
