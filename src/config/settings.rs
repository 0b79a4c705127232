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

use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use validator::Validate;

use crate::domain::services::crawl_pipeline::PipelineSettings;
use crate::engines::reqwest_engine::FetcherConfig;
use crate::infrastructure::services::rate_limiting_service_impl::SlidingWindowConfig;
use crate::utils::retry_policy::RetryPolicy;

/// 应用程序配置设置
///
/// 包含数据库、Redis、服务器、限流、抓取器、管道和后台任务等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// Redis配置
    pub redis: RedisSettings,
    /// 服务器配置
    pub server: ServerSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
    /// 速率限制配置
    pub rate_limiting: RateLimitingSettings,
    /// 抓取器配置
    pub fetcher: FetcherSettings,
    /// 管道配置
    pub pipeline: PipelineConfigSettings,
    /// Worker配置
    pub workers: WorkerSettings,
    /// 调度器配置
    pub scheduler: SchedulerSettings,
    /// 日志保留配置
    pub retention: RetentionSettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// Redis配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis连接URL
    pub url: String,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用Prometheus导出
    pub enabled: bool,
    /// 导出监听地址
    pub addr: String,
}

/// 速率限制配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RateLimitingSettings {
    /// 滑动窗口长度（秒）
    #[validate(range(min = 1))]
    pub window_seconds: u64,
    /// Redis键前缀
    pub key_prefix: String,
    /// 单次存储操作超时（毫秒）
    pub store_timeout_ms: u64,
    /// 同一页连续被拒绝的上限
    #[validate(range(min = 1))]
    pub max_consecutive_denials: u32,
    /// 单次等待准入的最长时间（秒）
    pub max_denial_wait_seconds: u64,
    /// 存储不可用时允许放行的最长时间（秒），未设置表示不限
    pub fail_open_max_seconds: Option<u64>,
}

/// 抓取器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherSettings {
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    /// 包含首次请求的最大尝试次数
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_factor: f64,
    pub user_agent: String,
}

/// 管道配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfigSettings {
    /// 错误率上限
    pub max_error_ratio: f64,
    /// 开始检查错误率所需的最少抓取次数
    pub error_ratio_min_samples: u32,
    /// 同一页的页面级重试次数
    pub page_retry_limit: u32,
    /// 任务总时长上限（秒）
    pub job_timeout_seconds: u64,
}

/// Worker配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    /// Worker数量
    pub count: usize,
    /// 任务队列容量
    pub queue_capacity: usize,
}

/// 调度器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    pub enabled: bool,
    /// 检查间隔（秒）
    pub tick_seconds: u64,
}

/// 日志保留配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionSettings {
    /// 爬取日志保留天数
    pub crawl_log_days: i64,
    /// 清理间隔（秒）
    pub cleanup_interval_seconds: u64,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加默认值、`config/default`、`config/{APP_ENVIRONMENT}` 和
    /// `LEADCRAWL__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败或取值越界
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let settings: Self = Self::with_defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("LEADCRAWL").separator("__"))
            .build()?
            .try_deserialize()?;
        settings.check()?;
        Ok(settings)
    }

    /// 检查反序列化后无法表达的取值范围
    pub fn check(&self) -> Result<(), ConfigError> {
        self.rate_limiting
            .validate()
            .map_err(|e| ConfigError::Message(format!("rate_limiting: {}", e)))
    }

    /// 只包含默认值的构建器，数据库和Redis地址需要另行提供
    pub fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            // Default DB pool settings
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 2)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            .set_default("metrics.enabled", true)?
            .set_default("metrics.addr", "0.0.0.0:9000")?
            .set_default("rate_limiting.window_seconds", 60)?
            .set_default("rate_limiting.key_prefix", "leadcrawl:ratelimit")?
            .set_default("rate_limiting.store_timeout_ms", 500)?
            .set_default("rate_limiting.max_consecutive_denials", 5)?
            .set_default("rate_limiting.max_denial_wait_seconds", 60)?
            .set_default("fetcher.timeout_seconds", 30)?
            .set_default("fetcher.connect_timeout_seconds", 10)?
            .set_default("fetcher.max_attempts", 3)?
            .set_default("fetcher.initial_backoff_ms", 1000)?
            .set_default("fetcher.max_backoff_ms", 30_000)?
            .set_default("fetcher.jitter_factor", 0.1)?
            .set_default("fetcher.user_agent", "Mozilla/5.0 (compatible; leadcrawl/0.1)")?
            .set_default("pipeline.max_error_ratio", 0.5)?
            .set_default("pipeline.error_ratio_min_samples", 4)?
            .set_default("pipeline.page_retry_limit", 2)?
            .set_default("pipeline.job_timeout_seconds", 1800)?
            .set_default("workers.count", 4)?
            .set_default("workers.queue_capacity", 1024)?
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.tick_seconds", 300)?
            .set_default("retention.crawl_log_days", 30)?
            .set_default("retention.cleanup_interval_seconds", 3600)
    }
}

impl RateLimitingSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    pub fn sliding_window_config(&self) -> SlidingWindowConfig {
        SlidingWindowConfig {
            key_prefix: self.key_prefix.clone(),
            window: self.window(),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
        }
    }

    pub fn fail_open_max(&self) -> Option<Duration> {
        self.fail_open_max_seconds.map(Duration::from_secs)
    }
}

impl FetcherSettings {
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            timeout: Duration::from_secs(self.timeout_seconds),
            connect_timeout: Duration::from_secs(self.connect_timeout_seconds),
            user_agent: self.user_agent.clone(),
            retry_policy: RetryPolicy {
                max_attempts: self.max_attempts.max(1),
                initial_backoff: Duration::from_millis(self.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.max_backoff_ms),
                jitter_factor: self.jitter_factor.clamp(0.0, 1.0),
                enable_jitter: self.jitter_factor > 0.0,
                ..RetryPolicy::default()
            },
        }
    }
}

impl Settings {
    /// 管道运行参数
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            max_consecutive_denials: self.rate_limiting.max_consecutive_denials.max(1),
            max_denial_wait: Duration::from_secs(self.rate_limiting.max_denial_wait_seconds),
            page_retry_limit: self.pipeline.page_retry_limit,
            max_error_ratio: self.pipeline.max_error_ratio,
            error_ratio_min_samples: self.pipeline.error_ratio_min_samples,
            job_timeout: Duration::from_secs(self.pipeline.job_timeout_seconds),
        }
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
