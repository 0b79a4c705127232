// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 线索候选
///
/// 解析器从单个页面提取的临时记录，不直接持久化，总是经由线索存储写入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadCandidate {
    pub name: String,
    pub role: String,
    pub company: String,
    /// 公开的联系邮箱，没有时为空串
    pub email: String,
    pub snippet: String,
    pub tags: Vec<String>,
    pub profile_url: String,
    pub source_domain: String,
    /// 解析器相关的上下文（子版块、帖子ID等）
    pub raw_data: serde_json::Value,
}

/// 线索实体
///
/// 每个 (profile_url, source_domain) 组合只有一条线索。
/// 再次出现时非身份字段以最新候选为准，id 与 created_at 保持不变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub company: String,
    pub email: String,
    pub snippet: String,
    pub tags: Vec<String>,
    pub profile_url: String,
    pub source_domain: String,
    pub raw_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    pub lead_id: Uuid,
    /// true 表示新建，false 表示更新了已有线索
    pub created: bool,
}

impl Lead {
    pub fn has_email(&self) -> bool {
        !self.email.is_empty()
    }
}

/// 线索查询参数
///
/// 所有条件同时生效
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadQuery {
    pub source_domain: Option<String>,
    pub tag: Option<String>,
    /// 在姓名、职位、公司和邮箱中查找，不区分大小写
    pub q: Option<String>,
    /// true 只要有邮箱的线索，false 只要没有邮箱的线索
    pub has_email: Option<bool>,
    /// 创建时间下界（含）
    pub created_after: Option<DateTime<Utc>>,
    /// 创建时间上界（含）
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// 按来源聚合的线索数量
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadSourceCount {
    pub source_domain: String,
    pub count: i64,
}
