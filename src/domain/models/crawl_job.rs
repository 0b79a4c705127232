// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 爬取任务实体
///
/// 表示管道针对某个站点配置的一次执行。任务只由任务追踪器修改，
/// 一旦进入终态便不会重新打开，新的运行需要新的任务。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 关联的站点配置
    pub site_config_id: Uuid,
    /// 任务状态
    pub status: CrawlJobStatus,
    /// 触发者（api、scheduler 等）
    pub triggered_by: String,
    /// 聚合统计
    pub stats: CrawlStats,
    /// 失败或部分完成时的说明
    pub error_message: Option<String>,
    /// 开始时间
    pub started_at: Option<DateTime<Utc>>,
    /// 结束时间
    pub finished_at: Option<DateTime<Utc>>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl CrawlJob {
    /// 创建处于待处理状态的新任务
    pub fn new_pending(site_config_id: Uuid, triggered_by: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_config_id,
            status: CrawlJobStatus::Pending,
            triggered_by: triggered_by.into(),
            stats: CrawlStats::default(),
            error_message: None,
            started_at: None,
            finished_at: None,
            created_at: Utc::now(),
        }
    }

    /// 运行时长（毫秒），任务未结束时返回 None
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// 任务聚合统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    /// HTTP 抓取成功的页数
    pub pages_fetched: i32,
    /// 新建线索数
    pub leads_found: i32,
    /// 已存在并被更新的线索数
    pub leads_updated: i32,
    /// 抓取与解析错误数
    pub error_count: i32,
}

/// 按状态统计的任务数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStatusCounts {
    pub total: u64,
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub partial: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl JobStatusCounts {
    pub fn add(&mut self, status: CrawlJobStatus, count: u64) {
        let slot = match status {
            CrawlJobStatus::Pending => &mut self.pending,
            CrawlJobStatus::Running => &mut self.running,
            CrawlJobStatus::Completed => &mut self.completed,
            CrawlJobStatus::Partial => &mut self.partial,
            CrawlJobStatus::Failed => &mut self.failed,
            CrawlJobStatus::Cancelled => &mut self.cancelled,
        };
        *slot += count;
        self.total += count;
    }
}

/// 产出线索的任务累计的页数和线索数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobOutputTotals {
    pub pages_fetched: i64,
    pub leads_found: i64,
    pub leads_updated: i64,
}

/// 爬取任务状态
///
/// 状态转换：
/// Pending → Running → Completed/Failed/Partial
/// Pending → Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrawlJobStatus {
    /// 待处理
    #[default]
    Pending,
    /// 运行中
    Running,
    /// 已完成
    Completed,
    /// 已失败
    Failed,
    /// 部分完成
    Partial,
    /// 开始前被取消
    Cancelled,
}

impl CrawlJobStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CrawlJobStatus::Completed
                | CrawlJobStatus::Failed
                | CrawlJobStatus::Partial
                | CrawlJobStatus::Cancelled
        )
    }
}

impl fmt::Display for CrawlJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CrawlJobStatus::Pending => write!(f, "pending"),
            CrawlJobStatus::Running => write!(f, "running"),
            CrawlJobStatus::Completed => write!(f, "completed"),
            CrawlJobStatus::Failed => write!(f, "failed"),
            CrawlJobStatus::Partial => write!(f, "partial"),
            CrawlJobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for CrawlJobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CrawlJobStatus::Pending),
            "running" => Ok(CrawlJobStatus::Running),
            "completed" => Ok(CrawlJobStatus::Completed),
            "failed" => Ok(CrawlJobStatus::Failed),
            "partial" => Ok(CrawlJobStatus::Partial),
            "cancelled" => Ok(CrawlJobStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// 单次抓取尝试的日志条目
///
/// 只追加，写入后不可修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlLogEntry {
    pub id: Uuid,
    pub job_id: Uuid,
    /// 任务内的顺序号，从 1 开始
    pub sequence: i32,
    pub url: String,
    pub outcome: LogOutcome,
    pub http_status: Option<u16>,
    /// 抓取错误类别（timeout、server_error 等）
    pub error_kind: Option<String>,
    pub error: Option<String>,
    pub content_type: Option<String>,
    /// 抓取器在首次尝试之外的重试次数
    pub retries: u32,
    pub elapsed_ms: u64,
    pub leads_found: i32,
    pub leads_updated: i32,
    pub created_at: DateTime<Utc>,
}

impl CrawlLogEntry {
    pub fn new(job_id: Uuid, sequence: i32, url: impl Into<String>, outcome: LogOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            sequence,
            url: url.into(),
            outcome,
            http_status: None,
            error_kind: None,
            error: None,
            content_type: None,
            retries: 0,
            elapsed_ms: 0,
            leads_found: 0,
            leads_updated: 0,
            created_at: Utc::now(),
        }
    }
}

/// 日志条目结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutcome {
    Success,
    ParseError,
    FetchError,
    SkippedRateLimited,
    /// 配置错误，任务在抓取前终止
    ConfigError,
}

impl fmt::Display for LogOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogOutcome::Success => write!(f, "success"),
            LogOutcome::ParseError => write!(f, "parse_error"),
            LogOutcome::FetchError => write!(f, "fetch_error"),
            LogOutcome::SkippedRateLimited => write!(f, "skipped_rate_limited"),
            LogOutcome::ConfigError => write!(f, "config_error"),
        }
    }
}

impl FromStr for LogOutcome {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(LogOutcome::Success),
            "parse_error" => Ok(LogOutcome::ParseError),
            "fetch_error" => Ok(LogOutcome::FetchError),
            "skipped_rate_limited" => Ok(LogOutcome::SkippedRateLimited),
            "config_error" => Ok(LogOutcome::ConfigError),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in [
            CrawlJobStatus::Pending,
            CrawlJobStatus::Running,
            CrawlJobStatus::Completed,
            CrawlJobStatus::Failed,
            CrawlJobStatus::Partial,
            CrawlJobStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<CrawlJobStatus>(), Ok(status));
        }
        assert!("queued".parse::<CrawlJobStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!CrawlJobStatus::Pending.is_terminal());
        assert!(!CrawlJobStatus::Running.is_terminal());
        assert!(CrawlJobStatus::Partial.is_terminal());
        assert!(CrawlJobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&LogOutcome::SkippedRateLimited).unwrap();
        assert_eq!(json, "\"skipped_rate_limited\"");
    }
}
