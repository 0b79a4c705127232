// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::use_cases::{
    crawl_use_case::CrawlUseCase, lead_use_case::LeadUseCase,
    site_config_use_case::SiteConfigUseCase,
};
use crate::presentation::handlers::{crawl_job_handler, lead_handler, site_config_handler};
use axum::{
    routing::{get, post, put},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 路由依赖的用例集合
#[derive(Clone)]
pub struct AppContext {
    pub site_config_use_case: Arc<SiteConfigUseCase>,
    pub crawl_use_case: Arc<CrawlUseCase>,
    pub lead_use_case: Arc<LeadUseCase>,
}

/// 创建应用路由
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(context: AppContext) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let api_routes = Router::new()
        .route(
            "/v1/configs",
            post(site_config_handler::create_site_config)
                .get(site_config_handler::list_site_configs),
        )
        .route("/v1/configs/{id}", get(site_config_handler::get_site_config))
        .route(
            "/v1/configs/{id}/enabled",
            put(site_config_handler::set_site_config_enabled),
        )
        .route("/v1/configs/{id}/crawl", post(crawl_job_handler::trigger_crawl))
        .route("/v1/configs/{id}/jobs", get(crawl_job_handler::list_config_jobs))
        .route(
            "/v1/configs/{id}/performance",
            get(crawl_job_handler::config_performance),
        )
        .route("/v1/jobs/stats", get(crawl_job_handler::crawl_stats))
        .route(
            "/v1/jobs/{id}",
            get(crawl_job_handler::get_job).delete(crawl_job_handler::cancel_job),
        )
        .route("/v1/jobs/{id}/logs", get(crawl_job_handler::get_job_logs))
        .route("/v1/leads", get(lead_handler::list_leads))
        .route("/v1/leads/stats", get(lead_handler::lead_stats))
        .route("/v1/leads/{id}", get(lead_handler::get_lead))
        .layer(Extension(context.site_config_use_case))
        .layer(Extension(context.crawl_use_case))
        .layer(Extension(context.lead_use_case));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
///
/// # 返回值
///
/// 返回应用版本号
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
