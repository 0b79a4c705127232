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

use leadcrawl::application::use_cases::crawl_use_case::CrawlUseCase;
use leadcrawl::application::use_cases::lead_use_case::LeadUseCase;
use leadcrawl::application::use_cases::site_config_use_case::SiteConfigUseCase;
use leadcrawl::config::settings::Settings;
use leadcrawl::domain::services::cancellation::CancellationRegistry;
use leadcrawl::domain::services::crawl_pipeline::CrawlPipeline;
use leadcrawl::domain::services::rate_limiting_service::RateLimiter;
use leadcrawl::engines::reqwest_engine::ReqwestFetcher;
use leadcrawl::infrastructure::cache::redis_client::RedisClient;
use leadcrawl::infrastructure::database::connection;
use leadcrawl::infrastructure::repositories::crawl_job_repo_impl::CrawlJobRepositoryImpl;
use leadcrawl::infrastructure::repositories::lead_repo_impl::LeadRepositoryImpl;
use leadcrawl::infrastructure::repositories::site_config_repo_impl::SiteConfigRepositoryImpl;
use leadcrawl::infrastructure::services::rate_limiting_service_impl::{
    FailOpenRateLimiter, RedisSlidingWindowLimiter,
};
use leadcrawl::parsers::registry::ParserRegistry;
use leadcrawl::presentation::routes::{self, AppContext};
use leadcrawl::queue::job_queue::ChannelJobQueue;
use leadcrawl::queue::scheduler::CrawlScheduler;
use leadcrawl::workers::manager::WorkerManager;
use leadcrawl::workers::retention_worker::RetentionWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use leadcrawl::utils::telemetry;
use migration::{Migrator, MigratorTrait};

/// 关闭时等待运行中任务完成的时间
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting leadcrawl...");

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    leadcrawl::infrastructure::metrics::init_metrics(&settings.metrics);

    // 3. Connect to database
    let db = connection::create_pool(&settings.database).await?;
    let db = Arc::new(db);
    info!("Database connection established");

    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Rate limiter: shared Redis window, fail-open when the store is unreachable
    let redis_client = RedisClient::new(&settings.redis.url)?;
    if let Err(e) = redis_client.ping().await {
        warn!(error = %e, "Redis is not reachable at start-up, rate limiting will fail open");
    }
    let redis_limiter: Arc<dyn RateLimiter> = Arc::new(RedisSlidingWindowLimiter::new(
        redis_client,
        settings.rate_limiting.sliding_window_config(),
    ));
    let rate_limiter = Arc::new(FailOpenRateLimiter::new(
        redis_limiter,
        settings.rate_limiting.fail_open_max(),
        settings.rate_limiting.window(),
    ));
    info!("Rate limiter initialized");

    // 5. Pipeline components
    let site_config_repo = Arc::new(SiteConfigRepositoryImpl::new(db.clone()));
    let job_repo = Arc::new(CrawlJobRepositoryImpl::new(db.clone()));
    let lead_repo = Arc::new(LeadRepositoryImpl::new(db.clone()));

    let fetcher = Arc::new(ReqwestFetcher::new(settings.fetcher.fetcher_config())?);
    let parsers = Arc::new(ParserRegistry::with_defaults());
    let cancellation = CancellationRegistry::new();

    let pipeline = Arc::new(CrawlPipeline::new(
        job_repo.clone(),
        site_config_repo.clone(),
        lead_repo.clone(),
        rate_limiter,
        fetcher,
        parsers.clone(),
        cancellation.clone(),
        settings.pipeline_settings(),
    ));

    let queue = Arc::new(ChannelJobQueue::new(settings.workers.queue_capacity));
    let crawl_use_case = Arc::new(CrawlUseCase::new(
        site_config_repo.clone(),
        job_repo.clone(),
        queue.clone(),
        cancellation,
    ));

    // 6. Start workers, then recover jobs left over by a previous process
    let mut worker_manager = WorkerManager::new(pipeline, queue.clone(), job_repo.clone());
    worker_manager.start_workers(settings.workers.count);
    worker_manager.recover_jobs().await?;

    worker_manager.spawn(Arc::new(RetentionWorker::new(
        job_repo.clone(),
        settings.retention.crawl_log_days,
        Duration::from_secs(settings.retention.cleanup_interval_seconds),
        worker_manager.shutdown_signal(),
    )));

    let scheduler_handle = if settings.scheduler.enabled {
        let scheduler = CrawlScheduler::new(
            site_config_repo.clone(),
            job_repo.clone(),
            crawl_use_case.clone(),
            Duration::from_secs(settings.scheduler.tick_seconds),
        );
        Some(scheduler.start(worker_manager.shutdown_signal()))
    } else {
        info!("Scheduler disabled");
        None
    };

    // 7. Start HTTP server
    let app = routes::routes(AppContext {
        site_config_use_case: Arc::new(SiteConfigUseCase::new(site_config_repo, parsers)),
        crawl_use_case,
        lead_use_case: Arc::new(LeadUseCase::new(lead_repo)),
    });

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    worker_manager.shutdown(SHUTDOWN_GRACE).await;
    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            error!("Scheduler task failed: {}", e);
        }
    }
    info!("leadcrawl stopped");

    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for shutdown signal: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Unable to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
