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

use crate::engines::traits::{
    FetchError, FetchErrorKind, FetchOutcome, FetchRequest, Fetcher, RetryGate,
};
use crate::utils::retry_policy::RetryPolicy;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 抓取器配置
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// 单次请求总超时
    pub timeout: Duration,
    /// 建立连接超时
    pub connect_timeout: Duration,
    /// User-Agent
    pub user_agent: String,
    /// 重试策略
    pub retry_policy: RetryPolicy,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: "Mozilla/5.0 (compatible; leadcrawl/0.1)".to_string(),
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// 基于reqwest的抓取器
///
/// 瞬时错误（超时、连接失败、5xx、429）按重试策略退避重试，
/// 其他 4xx 立即返回。每次重试前都要经过调用方的重试准入，
/// 429 的等待时间因此由限流器决定，不读取服务端的 Retry-After。
pub struct ReqwestFetcher {
    client: reqwest::Client,
    retry_policy: RetryPolicy,
}

impl ReqwestFetcher {
    /// 创建抓取器
    ///
    /// # 参数
    ///
    /// * `config` - 抓取器配置
    ///
    /// # 返回值
    ///
    /// * `Ok(ReqwestFetcher)` - 抓取器
    /// * `Err(FetchError)` - HTTP客户端构建失败
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            retry_policy: config.retry_policy,
        })
    }

    fn build_headers(headers: &std::collections::HashMap<String, String>) -> Result<HeaderMap, FetchError> {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            let name = HeaderName::from_bytes(k.as_bytes()).map_err(|e| {
                FetchError::new(FetchErrorKind::InvalidRequest, format!("header {}: {}", k, e))
            })?;
            let value = HeaderValue::from_str(v).map_err(|e| {
                FetchError::new(FetchErrorKind::InvalidRequest, format!("header {}: {}", k, e))
            })?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    /// 执行HTTP抓取
    ///
    /// # 参数
    ///
    /// * `request` - 抓取请求
    /// * `gate` - 重试准入
    ///
    /// # 返回值
    ///
    /// 最终的状态码、响应体或错误，以及尝试次数和耗时
    async fn fetch(&self, request: &FetchRequest, gate: &dyn RetryGate) -> FetchOutcome {
        let start = Instant::now();
        let mut outcome = FetchOutcome {
            url: request.url.clone(),
            status: None,
            body: None,
            content_type: None,
            error: None,
            attempts: 0,
            elapsed: Duration::ZERO,
        };

        let headers = match Self::build_headers(&request.headers) {
            Ok(h) => h,
            Err(e) => {
                outcome.error = Some(e);
                outcome.elapsed = start.elapsed();
                return outcome;
            }
        };

        loop {
            outcome.attempts += 1;

            let failure = match self
                .client
                .get(&request.url)
                .headers(headers.clone())
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status().as_u16();
                    outcome.status = Some(status);
                    outcome.content_type = response
                        .headers()
                        .get(CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.to_string());

                    match FetchErrorKind::from_status(status) {
                        None => match response.text().await {
                            Ok(body) => {
                                outcome.body = Some(body);
                                outcome.elapsed = start.elapsed();
                                return outcome;
                            }
                            Err(e) => FetchError::from(e),
                        },
                        Some(kind) => FetchError::new(kind, format!("HTTP {}", status)),
                    }
                }
                Err(e) => FetchError::from(e),
            };

            if !failure.kind.is_transient() || !self.retry_policy.should_retry(outcome.attempts) {
                if failure.kind.is_transient() {
                    warn!(
                        url = %request.url,
                        attempts = outcome.attempts,
                        kind = %failure.kind,
                        "Fetch failed after exhausting retries"
                    );
                } else {
                    debug!(url = %request.url, kind = %failure.kind, "Fetch failed, not retryable");
                }
                outcome.error = Some(failure);
                outcome.elapsed = start.elapsed();
                return outcome;
            }

            let backoff = self.retry_policy.calculate_backoff(outcome.attempts);
            debug!(
                url = %request.url,
                attempt = outcome.attempts,
                kind = %failure.kind,
                backoff_ms = backoff.as_millis() as u64,
                "Transient fetch error, retrying"
            );
            tokio::time::sleep(backoff).await;

            if !gate.admit_retry().await {
                debug!(url = %request.url, attempts = outcome.attempts, "Retry not admitted, giving up");
                outcome.error = Some(failure);
                outcome.elapsed = start.elapsed();
                return outcome;
            }
        }
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
