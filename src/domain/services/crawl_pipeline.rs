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

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::crawl_job::{
    CrawlJob, CrawlJobStatus, CrawlLogEntry, CrawlStats, LogOutcome,
};
use crate::domain::models::lead::LeadCandidate;
use crate::domain::models::site_config::SiteConfig;
use crate::domain::repositories::crawl_job_repository::{CrawlJobRepository, RepositoryError};
use crate::domain::repositories::lead_repository::LeadRepository;
use crate::domain::repositories::site_config_repository::SiteConfigRepository;
use crate::domain::services::cancellation::CancellationRegistry;
use crate::domain::services::rate_limiting_service::RateLimiter;
use crate::engines::traits::{FetchOutcome, FetchRequest, Fetcher, RetryGate};
use crate::parsers::registry::ParserRegistry;
use crate::parsers::traits::LeadParser;

/// 管道运行参数
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// 同一页连续被拒绝的上限，达到后放弃剩余分页
    pub max_consecutive_denials: u32,
    /// 单次等待准入的最长时间
    pub max_denial_wait: Duration,
    /// 可恢复的抓取错误在同一页上的重试次数
    pub page_retry_limit: u32,
    /// 错误率上限
    pub max_error_ratio: f64,
    /// 开始检查错误率所需的最少抓取次数
    pub error_ratio_min_samples: u32,
    /// 任务总时长上限
    pub job_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_consecutive_denials: 5,
            max_denial_wait: Duration::from_secs(60),
            page_retry_limit: 2,
            max_error_ratio: 0.5,
            error_ratio_min_samples: 4,
            job_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// 管道错误
///
/// 页面级的抓取和解析错误不会出现在这里，它们只记录为日志条目
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("crawl job {0} not found")]
    JobNotFound(Uuid),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 一次运行的结果摘要
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub job_id: Uuid,
    pub status: CrawlJobStatus,
    pub stats: CrawlStats,
    /// 抓取并解析成功的页数
    pub pages_succeeded: u32,
    pub error_message: Option<String>,
}

/// 分页结束的原因
#[derive(Debug, Clone, PartialEq)]
enum StopReason {
    /// 没有后续页或达到页数上限
    Exhausted,
    /// 提前结束（限流、抓取错误、解析错误）
    Aborted(String),
    ErrorRatio(f64),
    Timeout,
    Cancelled,
    /// 运行中配置被禁用
    Disabled,
    /// 配置错误
    Fatal(String),
}

enum PageStep {
    Continue,
    Stop(StopReason),
}

enum AdmissionResult {
    Admitted,
    Denied(u32),
    TimedOut,
    Cancelled,
}

/// 运行期间的可变状态
#[derive(Debug, Default)]
struct RunState {
    stats: CrawlStats,
    sequence: i32,
    pages_succeeded: u32,
    /// 抓取调用次数
    attempts: u32,
    /// 当前页已进行的页面级重试
    page_retries: u32,
    cursor: Option<String>,
    has_more: bool,
}

impl RunState {
    fn next_sequence(&mut self) -> i32 {
        self.sequence += 1;
        self.sequence
    }

    fn error_ratio(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            f64::from(self.stats.error_count) / f64::from(self.attempts)
        }
    }

    fn error_ratio_exceeded(&self, settings: &PipelineSettings) -> Option<f64> {
        let ratio = self.error_ratio();
        (self.attempts >= settings.error_ratio_min_samples && ratio > settings.max_error_ratio)
            .then_some(ratio)
    }
}

/// 爬取管道
///
/// 驱动单个任务的分页循环：申请准入 → 抓取 → 解析 → 写入线索 → 记录日志 → 决定是否继续。
/// 抓取器的每次内部重试也要重新申请准入。
/// 页面之间严格串行，跨任务共享的只有限流器和线索存储。
pub struct CrawlPipeline {
    jobs: Arc<dyn CrawlJobRepository>,
    site_configs: Arc<dyn SiteConfigRepository>,
    leads: Arc<dyn LeadRepository>,
    rate_limiter: Arc<dyn RateLimiter>,
    fetcher: Arc<dyn Fetcher>,
    parsers: Arc<ParserRegistry>,
    cancellation: CancellationRegistry,
    settings: PipelineSettings,
}

impl CrawlPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Arc<dyn CrawlJobRepository>,
        site_configs: Arc<dyn SiteConfigRepository>,
        leads: Arc<dyn LeadRepository>,
        rate_limiter: Arc<dyn RateLimiter>,
        fetcher: Arc<dyn Fetcher>,
        parsers: Arc<ParserRegistry>,
        cancellation: CancellationRegistry,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            jobs,
            site_configs,
            leads,
            rate_limiter,
            fetcher,
            parsers,
            cancellation,
            settings,
        }
    }

    pub fn cancellation(&self) -> &CancellationRegistry {
        &self.cancellation
    }

    /// 执行一个任务
    ///
    /// # 参数
    ///
    /// * `job_id` - 待执行的任务ID
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(RunSummary))` - 任务已运行到终态
    /// * `Ok(None)` - 任务不是 pending（已取消或已被其他 worker 领取），跳过
    /// * `Err(PipelineError)` - 任务不存在或存储不可用
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn run(&self, job_id: Uuid) -> Result<Option<RunSummary>, PipelineError> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or(PipelineError::JobNotFound(job_id))?;

        if job.status != CrawlJobStatus::Pending {
            info!(status = %job.status, "Job is not pending, skipping");
            return Ok(None);
        }
        // 在领取之前登记，领取与登记之间到达的取消请求也能被看到
        self.cancellation.register(job_id);
        let claimed = match self.jobs.mark_running(job_id, Utc::now()).await {
            Ok(claimed) => claimed,
            Err(e) => {
                self.cancellation.remove(job_id);
                return Err(e.into());
            }
        };
        if !claimed {
            self.cancellation.remove(job_id);
            info!("Job was claimed or cancelled before start, skipping");
            return Ok(None);
        }

        let mut state = RunState::default();
        let result = self.execute(&job, &mut state).await;
        self.cancellation.remove(job_id);

        match result {
            Ok(summary) => Ok(Some(summary)),
            Err(e) => {
                error!(error = %e, "Crawl pipeline aborted by storage error");
                // 尽力把任务置为失败，避免停留在 running
                if let Err(finish_err) = self
                    .jobs
                    .finish(
                        job_id,
                        CrawlJobStatus::Failed,
                        &state.stats,
                        Some(e.to_string()),
                        Utc::now(),
                    )
                    .await
                {
                    error!(error = %finish_err, "Failed to mark job as failed");
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        job: &CrawlJob,
        state: &mut RunState,
    ) -> Result<RunSummary, PipelineError> {
        let deadline = Instant::now() + self.settings.job_timeout;

        let (config, parser) = match self.prepare(job).await? {
            Ok(prepared) => prepared,
            Err(reason) => {
                let mut entry = CrawlLogEntry::new(job.id, state.next_sequence(), "", LogOutcome::ConfigError);
                entry.error = Some(reason.clone());
                self.jobs.append_log(&entry).await?;
                warn!(reason = %reason, "Crawl job failed before first fetch");
                return self
                    .finish(job.id, None, state, StopReason::Fatal(reason))
                    .await;
            }
        };

        info!(
            domain = %config.domain,
            source_type = %config.source_type,
            max_pages = config.max_pages,
            "Starting crawl"
        );

        state.has_more = true;
        let reason = loop {
            if !state.has_more || state.stats.pages_fetched as u32 >= config.max_pages {
                break StopReason::Exhausted;
            }
            if self.cancellation.is_cancelled(job.id) {
                break StopReason::Cancelled;
            }
            if Instant::now() >= deadline {
                break StopReason::Timeout;
            }
            if !self.site_configs.is_enabled(config.id).await? {
                break StopReason::Disabled;
            }

            let step = self
                .process_page(job.id, &config, parser.as_ref(), state, deadline)
                .await?;
            self.jobs.update_stats(job.id, &state.stats).await?;

            if let PageStep::Stop(reason) = step {
                break reason;
            }
            if let Some(ratio) = state.error_ratio_exceeded(&self.settings) {
                break StopReason::ErrorRatio(ratio);
            }
        };

        self.finish(job.id, Some(&config), state, reason).await
    }

    /// 读取配置快照并选出解析器
    ///
    /// 内层的 Err 是配置错误，任务应直接失败
    async fn prepare(
        &self,
        job: &CrawlJob,
    ) -> Result<Result<(SiteConfig, Arc<dyn LeadParser>), String>, PipelineError> {
        let Some(config) = self.site_configs.find_by_id(job.site_config_id).await? else {
            return Ok(Err(format!("site config {} not found", job.site_config_id)));
        };
        if !config.enabled {
            return Ok(Err("site config is disabled".to_string()));
        }
        if let Err(reason) = config.validate() {
            return Ok(Err(format!("invalid site config: {}", reason)));
        }
        let parser = match self.parsers.parser_for(&config.source_type) {
            Ok(parser) => parser,
            Err(e) => return Ok(Err(e.to_string())),
        };
        // 第一页的请求都构建不出来，说明解析器配置有误
        if let Err(e) = parser.build_request(&config, None) {
            return Ok(Err(e.to_string()));
        }
        Ok(Ok((config, parser)))
    }

    async fn process_page(
        &self,
        job_id: Uuid,
        config: &SiteConfig,
        parser: &dyn LeadParser,
        state: &mut RunState,
        deadline: Instant,
    ) -> Result<PageStep, PipelineError> {
        let request = match parser.build_request(config, state.cursor.as_deref()) {
            Ok(request) => request,
            Err(e) => {
                let mut entry = CrawlLogEntry::new(job_id, state.next_sequence(), "", LogOutcome::ConfigError);
                entry.error = Some(e.to_string());
                self.jobs.append_log(&entry).await?;
                return Ok(PageStep::Stop(StopReason::Aborted(e.to_string())));
            }
        };

        match self.acquire_admission(job_id, config, deadline).await {
            AdmissionResult::Admitted => {}
            AdmissionResult::Denied(denials) => {
                let entry = CrawlLogEntry::new(
                    job_id,
                    state.next_sequence(),
                    request.url.as_str(),
                    LogOutcome::SkippedRateLimited,
                );
                self.jobs.append_log(&entry).await?;
                warn!(domain = %config.domain, denials, "Rate limit stalled pagination");
                return Ok(PageStep::Stop(StopReason::Aborted(format!(
                    "rate limited: {} consecutive denials",
                    denials
                ))));
            }
            AdmissionResult::TimedOut => return Ok(PageStep::Stop(StopReason::Timeout)),
            AdmissionResult::Cancelled => return Ok(PageStep::Stop(StopReason::Cancelled)),
        }

        let gate = AdmissionGate {
            pipeline: self,
            job_id,
            config,
            deadline,
        };
        let outcome = self.fetcher.fetch(&request, &gate).await;
        state.attempts += 1;
        histogram!("crawl_fetch_duration_ms", "domain" => config.domain.clone())
            .record(outcome.elapsed.as_millis() as f64);

        let mut entry = log_entry_for(job_id, state.next_sequence(), &request, &outcome);

        let body = match (outcome.error, outcome.body) {
            (None, Some(body)) => body,
            (error, _) => {
                let kind = error.as_ref().map(|e| e.kind);
                let message = error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "empty response".to_string());
                entry.outcome = LogOutcome::FetchError;
                entry.error_kind = kind.map(|k| k.as_str().to_string());
                entry.error = Some(message.clone());
                self.jobs.append_log(&entry).await?;
                state.stats.error_count += 1;
                counter!(
                    "crawl_fetch_errors_total",
                    "domain" => config.domain.clone(),
                    "kind" => kind.map(|k| k.as_str()).unwrap_or("other")
                )
                .increment(1);

                let recoverable = kind.map(|k| k.is_page_recoverable()).unwrap_or(false);
                if recoverable && state.page_retries < self.settings.page_retry_limit {
                    state.page_retries += 1;
                    warn!(
                        url = %request.url,
                        page_retry = state.page_retries,
                        error = %message,
                        "Fetch failed, retrying page"
                    );
                    return Ok(PageStep::Continue);
                }
                warn!(url = %request.url, error = %message, "Fetch failed, stopping pagination");
                return Ok(PageStep::Stop(StopReason::Aborted(format!(
                    "fetch failed: {}",
                    message
                ))));
            }
        };

        state.page_retries = 0;
        state.stats.pages_fetched += 1;
        counter!("crawl_pages_fetched_total", "domain" => config.domain.clone()).increment(1);

        match parser.parse(config, state.cursor.as_deref(), &body) {
            Ok(page) => {
                let (created, updated) = self.store_candidates(config, &page.candidates).await?;
                state.stats.leads_found += created;
                state.stats.leads_updated += updated;
                state.pages_succeeded += 1;

                entry.leads_found = created;
                entry.leads_updated = updated;
                self.jobs.append_log(&entry).await?;
                debug!(
                    url = %request.url,
                    candidates = page.candidates.len(),
                    created,
                    updated,
                    "Page processed"
                );

                match page.next_cursor {
                    Some(next) if page.has_more => {
                        if state.cursor.as_deref() == Some(next.as_str()) {
                            // 游标没有前进，继续只会重复同一页
                            warn!(cursor = %next, "Cursor did not advance, stopping pagination");
                            state.has_more = false;
                        } else {
                            state.cursor = Some(next);
                        }
                    }
                    _ => state.has_more = false,
                }
                Ok(PageStep::Continue)
            }
            Err(e) => {
                entry.outcome = LogOutcome::ParseError;
                entry.error = Some(e.to_string());
                self.jobs.append_log(&entry).await?;
                state.stats.error_count += 1;

                match parser.skip_cursor(config, state.cursor.as_deref()) {
                    Some(next) => {
                        warn!(url = %request.url, error = %e, "Parse error, skipping page");
                        state.cursor = Some(next);
                        Ok(PageStep::Continue)
                    }
                    None => {
                        warn!(url = %request.url, error = %e, "Parse error, cannot continue pagination");
                        Ok(PageStep::Stop(StopReason::Aborted(format!("parse error: {}", e))))
                    }
                }
            }
        }
    }

    /// 申请准入，被拒绝时按建议时间等待后重试
    async fn acquire_admission(
        &self,
        job_id: Uuid,
        config: &SiteConfig,
        deadline: Instant,
    ) -> AdmissionResult {
        let mut denials = 0;
        loop {
            match self
                .rate_limiter
                .admit(&config.domain, config.requests_per_minute)
                .await
            {
                Ok(admission) if admission.allowed => return AdmissionResult::Admitted,
                Ok(admission) => {
                    denials += 1;
                    counter!("rate_limit_denied_total", "domain" => config.domain.clone())
                        .increment(1);
                    if denials >= self.settings.max_consecutive_denials {
                        return AdmissionResult::Denied(denials);
                    }
                    let wait = admission
                        .retry_after
                        .min(self.settings.max_denial_wait)
                        .max(Duration::from_millis(1));
                    if Instant::now() + wait >= deadline {
                        return AdmissionResult::TimedOut;
                    }
                    debug!(domain = %config.domain, denials, wait_ms = wait.as_millis() as u64, "Admission denied, waiting");
                    tokio::time::sleep(wait).await;
                    if self.cancellation.is_cancelled(job_id) {
                        return AdmissionResult::Cancelled;
                    }
                }
                Err(e) => {
                    warn!(
                        limiter = self.rate_limiter.name(),
                        domain = %config.domain,
                        error = %e,
                        "Rate limiter unavailable, admitting request"
                    );
                    return AdmissionResult::Admitted;
                }
            }
        }
    }

    /// 逐条写入候选，返回 (新建数, 更新数)
    async fn store_candidates(
        &self,
        config: &SiteConfig,
        candidates: &[LeadCandidate],
    ) -> Result<(i32, i32), PipelineError> {
        let mut created = 0;
        let mut updated = 0;
        for candidate in candidates {
            let outcome = self.leads.upsert(candidate).await?;
            if outcome.created {
                created += 1;
            } else {
                updated += 1;
            }
        }
        if created > 0 {
            counter!("crawl_leads_created_total", "domain" => config.domain.clone())
                .increment(created as u64);
        }
        if updated > 0 {
            counter!("crawl_leads_updated_total", "domain" => config.domain.clone())
                .increment(updated as u64);
        }
        Ok((created, updated))
    }

    async fn finish(
        &self,
        job_id: Uuid,
        config: Option<&SiteConfig>,
        state: &RunState,
        reason: StopReason,
    ) -> Result<RunSummary, PipelineError> {
        let (status, error_message) = decide_status(&reason, state, &self.settings);

        self.jobs
            .finish(job_id, status, &state.stats, error_message.clone(), Utc::now())
            .await?;

        if let Some(config) = config {
            if matches!(status, CrawlJobStatus::Completed | CrawlJobStatus::Partial) {
                self.site_configs.touch_last_crawl(config.id, Utc::now()).await?;
            }
        }

        counter!("crawl_jobs_finished_total", "status" => status.to_string()).increment(1);
        info!(
            status = %status,
            pages_fetched = state.stats.pages_fetched,
            pages_succeeded = state.pages_succeeded,
            leads_found = state.stats.leads_found,
            leads_updated = state.stats.leads_updated,
            error_count = state.stats.error_count,
            reason = error_message.as_deref().unwrap_or(""),
            "Crawl finished"
        );

        Ok(RunSummary {
            job_id,
            status,
            stats: state.stats,
            pages_succeeded: state.pages_succeeded,
            error_message,
        })
    }
}

/// 抓取器内部重试的准入，与翻页共用同一个限流器配额
struct AdmissionGate<'a> {
    pipeline: &'a CrawlPipeline,
    job_id: Uuid,
    config: &'a SiteConfig,
    deadline: Instant,
}

#[async_trait]
impl RetryGate for AdmissionGate<'_> {
    async fn admit_retry(&self) -> bool {
        if self.pipeline.cancellation.is_cancelled(self.job_id) {
            return false;
        }
        matches!(
            self.pipeline
                .acquire_admission(self.job_id, self.config, self.deadline)
                .await,
            AdmissionResult::Admitted
        )
    }
}

fn log_entry_for(
    job_id: Uuid,
    sequence: i32,
    request: &FetchRequest,
    outcome: &FetchOutcome,
) -> CrawlLogEntry {
    let mut entry = CrawlLogEntry::new(job_id, sequence, request.url.as_str(), LogOutcome::Success);
    entry.http_status = outcome.status;
    entry.content_type = outcome.content_type.clone();
    entry.retries = outcome.retries();
    entry.elapsed_ms = outcome.elapsed.as_millis() as u64;
    entry
}

/// 根据结束原因和成功页数决定终态
fn decide_status(
    reason: &StopReason,
    state: &RunState,
    settings: &PipelineSettings,
) -> (CrawlJobStatus, Option<String>) {
    let succeeded = state.pages_succeeded > 0;
    let early = |message: String| {
        if succeeded {
            (CrawlJobStatus::Partial, Some(message))
        } else {
            (CrawlJobStatus::Failed, Some(message))
        }
    };

    match reason {
        StopReason::Fatal(message) => (CrawlJobStatus::Failed, Some(message.clone())),
        StopReason::Disabled => (
            CrawlJobStatus::Failed,
            Some("site config disabled during run".to_string()),
        ),
        StopReason::Exhausted if !succeeded => (
            CrawlJobStatus::Failed,
            Some("no page was fetched and parsed successfully".to_string()),
        ),
        StopReason::Exhausted => match state.error_ratio_exceeded(settings) {
            Some(ratio) => (
                CrawlJobStatus::Partial,
                Some(format!("error ratio {:.2} above threshold", ratio)),
            ),
            None => (CrawlJobStatus::Completed, None),
        },
        StopReason::Aborted(message) => early(message.clone()),
        StopReason::ErrorRatio(ratio) => early(format!("error ratio {:.2} above threshold", ratio)),
        StopReason::Timeout => early("job timed out".to_string()),
        StopReason::Cancelled => early("cancelled".to_string()),
    }
}

#[cfg(test)]
#[path = "crawl_pipeline_test.rs"]
mod tests;
