// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum_test::TestServer;
use leadcrawl::application::use_cases::crawl_use_case::CrawlUseCase;
use leadcrawl::application::use_cases::lead_use_case::LeadUseCase;
use leadcrawl::application::use_cases::site_config_use_case::SiteConfigUseCase;
use leadcrawl::config::settings::DatabaseSettings;
use leadcrawl::domain::models::crawl_job::CrawlJob;
use leadcrawl::domain::repositories::crawl_job_repository::CrawlJobRepository;
use leadcrawl::domain::services::cancellation::CancellationRegistry;
use leadcrawl::domain::services::crawl_pipeline::{CrawlPipeline, PipelineSettings};
use leadcrawl::engines::reqwest_engine::{FetcherConfig, ReqwestFetcher};
use leadcrawl::infrastructure::database::connection;
use leadcrawl::infrastructure::repositories::crawl_job_repo_impl::CrawlJobRepositoryImpl;
use leadcrawl::infrastructure::repositories::lead_repo_impl::LeadRepositoryImpl;
use leadcrawl::infrastructure::repositories::site_config_repo_impl::SiteConfigRepositoryImpl;
use leadcrawl::infrastructure::services::rate_limiting_service_impl::LocalSlidingWindowLimiter;
use leadcrawl::parsers::registry::ParserRegistry;
use leadcrawl::presentation::routes::{self, AppContext};
use leadcrawl::queue::job_queue::ChannelJobQueue;
use leadcrawl::utils::retry_policy::RetryPolicy;
use leadcrawl::workers::manager::WorkerManager;
use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[allow(dead_code)]
pub struct TestApp {
    pub server: TestServer,
    pub db: Arc<DatabaseConnection>,
    pub site_configs: Arc<SiteConfigRepositoryImpl>,
    pub jobs: Arc<CrawlJobRepositoryImpl>,
    pub leads: Arc<LeadRepositoryImpl>,
    pub worker_manager: WorkerManager,
}

/// 迁移好的内存 SQLite 数据库
pub async fn setup_db() -> Arc<DatabaseConnection> {
    let settings = DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: None,
        min_connections: None,
        connect_timeout: None,
        idle_timeout: None,
    };
    let db = connection::create_pool(&settings).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    Arc::new(db)
}

/// 不等待退避的抓取器，便于测试重试次数
pub fn fast_fetcher() -> ReqwestFetcher {
    ReqwestFetcher::new(FetcherConfig {
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        retry_policy: RetryPolicy::immediate(),
        ..FetcherConfig::default()
    })
    .unwrap()
}

/// 使用真实仓库、真实抓取器和进程内限流器的完整应用，带两个 worker
pub async fn create_test_app() -> TestApp {
    create_test_app_with_workers(2).await
}

/// 指定 worker 数量；为 0 时任务停留在 pending
pub async fn create_test_app_with_workers(workers: usize) -> TestApp {
    let db = setup_db().await;
    let site_configs = Arc::new(SiteConfigRepositoryImpl::new(db.clone()));
    let jobs = Arc::new(CrawlJobRepositoryImpl::new(db.clone()));
    let leads = Arc::new(LeadRepositoryImpl::new(db.clone()));
    let parsers = Arc::new(ParserRegistry::with_defaults());
    let cancellation = CancellationRegistry::new();

    let pipeline = Arc::new(CrawlPipeline::new(
        jobs.clone(),
        site_configs.clone(),
        leads.clone(),
        Arc::new(LocalSlidingWindowLimiter::default()),
        Arc::new(fast_fetcher()),
        parsers.clone(),
        cancellation.clone(),
        PipelineSettings::default(),
    ));

    let queue = Arc::new(ChannelJobQueue::new(16));
    let crawl_use_case = Arc::new(CrawlUseCase::new(
        site_configs.clone(),
        jobs.clone(),
        queue.clone(),
        cancellation,
    ));

    let mut worker_manager = WorkerManager::new(pipeline, queue, jobs.clone());
    worker_manager.start_workers(workers);

    let app = routes::routes(AppContext {
        site_config_use_case: Arc::new(SiteConfigUseCase::new(site_configs.clone(), parsers)),
        crawl_use_case,
        lead_use_case: Arc::new(LeadUseCase::new(leads.clone())),
    });

    TestApp {
        server: TestServer::new(app).unwrap(),
        db,
        site_configs,
        jobs,
        leads,
        worker_manager,
    }
}

/// 轮询直到任务进入终态
pub async fn wait_for_terminal(jobs: &CrawlJobRepositoryImpl, job_id: Uuid) -> CrawlJob {
    for _ in 0..200 {
        let job = jobs.find_by_id(job_id).await.unwrap().unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {} did not reach a terminal state", job_id);
}
