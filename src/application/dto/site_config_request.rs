// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use validator::Validate;

fn empty_filters() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// 创建站点配置请求
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateSiteConfigDto {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub domain: String,
    #[validate(length(min = 1, max = 64))]
    pub source_type: String,
    #[serde(default = "empty_filters")]
    pub filters: serde_json::Value,
    #[serde(default)]
    pub start_urls: Vec<String>,
    #[validate(range(min = 1, max = 6000))]
    pub requests_per_minute: Option<u32>,
    #[validate(range(min = 1, max = 1000))]
    pub max_pages: Option<u32>,
    #[validate(range(min = 1, max = 8760))]
    pub crawl_interval_hours: Option<u32>,
    pub enabled: Option<bool>,
}

/// 启用/停用站点配置请求
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SetEnabledDto {
    pub enabled: bool,
}

/// 任务列表查询参数
#[derive(Debug, Clone, Copy, Default, Deserialize, Validate)]
pub struct JobListQuery {
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<u64>,
}

/// 运行表现查询参数
#[derive(Debug, Clone, Copy, Default, Deserialize, Validate)]
pub struct PerformanceQuery {
    /// 统计最近多少天
    #[validate(range(min = 1, max = 365))]
    pub days: Option<u32>,
}
