// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 站点爬取配置
///
/// 描述一个爬取目标：域名、来源类型、过滤参数以及配额。
/// 管道在任务开始时读取一份不可变快照，运行期间的修改不影响进行中的任务。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteConfig {
    /// 配置唯一标识符
    pub id: Uuid,
    /// 便于识别的名称
    pub name: String,
    /// 目标域名，同时作为限流键
    pub domain: String,
    /// 来源类型标签，用于选择解析器
    pub source_type: String,
    /// 站点相关的过滤与选项（分类、排序、分页大小等）
    pub filters: serde_json::Value,
    /// 可选的种子URL
    pub start_urls: Vec<String>,
    /// 每分钟请求配额
    pub requests_per_minute: u32,
    /// 单次任务最多抓取的页数
    pub max_pages: u32,
    /// 是否启用
    pub enabled: bool,
    /// 调度间隔（小时）
    pub crawl_interval_hours: u32,
    /// 最近一次成功爬取时间
    pub last_crawl_at: Option<DateTime<Utc>>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

impl SiteConfig {
    /// 创建新的站点配置，其余字段使用默认值
    pub fn new(
        name: impl Into<String>,
        domain: impl Into<String>,
        source_type: impl Into<String>,
        filters: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            domain: domain.into(),
            source_type: source_type.into(),
            filters,
            start_urls: Vec::new(),
            requests_per_minute: 30,
            max_pages: 10,
            enabled: true,
            crawl_interval_hours: 24,
            last_crawl_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 检查配置是否可以驱动一次爬取
    ///
    /// 来源类型是否已注册由解析器注册表单独检查。
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 配置有效
    /// * `Err(String)` - 无效原因
    pub fn validate(&self) -> Result<(), String> {
        if self.domain.trim().is_empty() {
            return Err("domain cannot be empty".to_string());
        }
        if self.requests_per_minute == 0 {
            return Err("requests_per_minute must be at least 1".to_string());
        }
        if self.max_pages == 0 {
            return Err("max_pages must be at least 1".to_string());
        }
        if self.crawl_interval_hours == 0 {
            return Err("crawl_interval_hours must be at least 1".to_string());
        }
        if !self.filters.is_object() {
            return Err("filters must be a JSON object".to_string());
        }
        Ok(())
    }

    /// 判断配置在给定时间是否到期需要调度
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last_crawl_at {
            None => true,
            Some(last) => now - last >= Duration::hours(i64::from(self.crawl_interval_hours)),
        }
    }
}
