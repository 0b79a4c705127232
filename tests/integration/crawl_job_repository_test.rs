// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::setup_db;
use chrono::{Duration, Utc};
use leadcrawl::domain::models::crawl_job::{
    CrawlJob, CrawlJobStatus, CrawlLogEntry, CrawlStats, JobOutputTotals, LogOutcome,
};
use leadcrawl::domain::models::site_config::SiteConfig;
use leadcrawl::domain::repositories::crawl_job_repository::{CrawlJobRepository, RepositoryError};
use leadcrawl::domain::repositories::site_config_repository::SiteConfigRepository;
use leadcrawl::infrastructure::repositories::crawl_job_repo_impl::CrawlJobRepositoryImpl;
use leadcrawl::infrastructure::repositories::site_config_repo_impl::SiteConfigRepositoryImpl;
use serde_json::json;
use uuid::Uuid;

async fn setup() -> (CrawlJobRepositoryImpl, Uuid) {
    let db = setup_db().await;
    let config = SiteConfig::new("rust", "reddit.com", "reddit", json!({"subreddits": ["rust"]}));
    SiteConfigRepositoryImpl::new(db.clone())
        .create(&config)
        .await
        .unwrap();
    (CrawlJobRepositoryImpl::new(db), config.id)
}

#[tokio::test]
async fn test_job_lifecycle() {
    let (jobs, config_id) = setup().await;
    let job = jobs
        .create(&CrawlJob::new_pending(config_id, "api"))
        .await
        .unwrap();
    assert!(jobs.has_active_job(config_id).await.unwrap());

    // 只有一个调用方能领取任务
    assert!(jobs.mark_running(job.id, Utc::now()).await.unwrap());
    assert!(!jobs.mark_running(job.id, Utc::now()).await.unwrap());
    assert!(!jobs.cancel_pending(job.id).await.unwrap());

    let stats = CrawlStats {
        pages_fetched: 2,
        leads_found: 7,
        leads_updated: 1,
        error_count: 0,
    };
    jobs.update_stats(job.id, &stats).await.unwrap();
    jobs.finish(job.id, CrawlJobStatus::Completed, &stats, None, Utc::now())
        .await
        .unwrap();

    let finished = jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(finished.status, CrawlJobStatus::Completed);
    assert_eq!(finished.stats, stats);
    assert!(finished.started_at.is_some());
    assert!(finished.duration_ms().is_some());
    assert!(!jobs.has_active_job(config_id).await.unwrap());

    // 终态任务不会被重新打开
    let again = jobs
        .finish(job.id, CrawlJobStatus::Failed, &stats, Some("late".into()), Utc::now())
        .await;
    assert!(matches!(again, Err(RepositoryError::NotFound)));
}

#[tokio::test]
async fn test_logs_are_ordered_by_sequence() {
    let (jobs, config_id) = setup().await;
    let job = jobs
        .create(&CrawlJob::new_pending(config_id, "scheduler"))
        .await
        .unwrap();

    let mut failed = CrawlLogEntry::new(job.id, 2, "https://reddit.com/r/rust/new.json?after=t3_a", LogOutcome::FetchError);
    failed.http_status = Some(503);
    failed.error_kind = Some("server_error".to_string());
    failed.retries = 2;
    jobs.append_log(&failed).await.unwrap();
    jobs.append_log(&CrawlLogEntry::new(job.id, 1, "https://reddit.com/r/rust/new.json", LogOutcome::Success))
        .await
        .unwrap();

    let logs = jobs.list_logs(job.id).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].sequence, 1);
    assert_eq!(logs[1].outcome, LogOutcome::FetchError);
    assert_eq!(logs[1].http_status, Some(503));
    assert_eq!(logs[1].error_kind.as_deref(), Some("server_error"));
    assert_eq!(logs[1].retries, 2);
}

#[tokio::test]
async fn test_listing_and_interrupted_recovery() {
    let (jobs, config_id) = setup().await;
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(jobs.create(&CrawlJob::new_pending(config_id, "api")).await.unwrap().id);
    }
    jobs.mark_running(ids[0], Utc::now()).await.unwrap();
    jobs.cancel_pending(ids[1]).await.unwrap();

    assert_eq!(jobs.list_by_site_config(config_id, 2).await.unwrap().len(), 2);
    assert_eq!(jobs.list_by_site_config(config_id, 50).await.unwrap().len(), 3);

    let pending = jobs.find_by_status(CrawlJobStatus::Pending).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, ids[2]);

    assert_eq!(jobs.fail_interrupted("interrupted").await.unwrap(), 1);
    let interrupted = jobs.find_by_id(ids[0]).await.unwrap().unwrap();
    assert_eq!(interrupted.status, CrawlJobStatus::Failed);
    assert_eq!(interrupted.error_message.as_deref(), Some("interrupted"));
    assert!(interrupted.finished_at.is_some());

    let cancelled = jobs.find_by_id(ids[1]).await.unwrap().unwrap();
    assert_eq!(cancelled.status, CrawlJobStatus::Cancelled);
}

/// 直接写入一个已结束的任务
async fn finished_job(
    jobs: &CrawlJobRepositoryImpl,
    config_id: Uuid,
    status: CrawlJobStatus,
    pages: i32,
    leads: i32,
    age: Duration,
) {
    let mut job = CrawlJob::new_pending(config_id, "scheduler");
    job.status = status;
    job.stats = CrawlStats {
        pages_fetched: pages,
        leads_found: leads,
        leads_updated: 1,
        error_count: 0,
    };
    job.created_at = Utc::now() - age;
    jobs.create(&job).await.unwrap();
}

#[tokio::test]
async fn test_status_counts_and_output_totals() {
    let (jobs, config_id) = setup().await;
    finished_job(&jobs, config_id, CrawlJobStatus::Completed, 3, 10, Duration::hours(1)).await;
    finished_job(&jobs, config_id, CrawlJobStatus::Partial, 2, 4, Duration::hours(2)).await;
    finished_job(&jobs, config_id, CrawlJobStatus::Failed, 0, 0, Duration::hours(3)).await;
    // 窗口之外
    finished_job(&jobs, config_id, CrawlJobStatus::Completed, 9, 99, Duration::days(10)).await;
    jobs.create(&CrawlJob::new_pending(config_id, "api")).await.unwrap();

    let all = jobs.status_counts(None, None).await.unwrap();
    assert_eq!(all.total, 5);
    assert_eq!(all.completed, 2);
    assert_eq!(all.pending, 1);

    let since = Utc::now() - Duration::days(7);
    let recent = jobs.status_counts(Some(config_id), Some(since)).await.unwrap();
    assert_eq!(recent.total, 4);
    assert_eq!(recent.completed, 1);
    assert_eq!(recent.partial, 1);
    assert_eq!(recent.failed, 1);
    assert_eq!(recent.pending, 1);

    let other = jobs.status_counts(Some(Uuid::new_v4()), None).await.unwrap();
    assert_eq!(other.total, 0);

    let totals = jobs.output_totals(config_id, since).await.unwrap();
    assert_eq!(
        totals,
        JobOutputTotals {
            pages_fetched: 5,
            leads_found: 14,
            leads_updated: 2,
        }
    );
    assert_eq!(
        jobs.output_totals(Uuid::new_v4(), since).await.unwrap(),
        JobOutputTotals::default()
    );
}
