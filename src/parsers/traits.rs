// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::domain::models::lead::LeadCandidate;
use crate::domain::models::site_config::SiteConfig;
use crate::engines::traits::FetchRequest;

/// 单个页面的解析结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    /// 提取出的线索候选
    pub candidates: Vec<LeadCandidate>,
    /// 下一页游标，对编排器不透明
    pub next_cursor: Option<String>,
    /// 是否还有后续页面
    pub has_more: bool,
}

impl ParsedPage {
    /// 最后一页
    pub fn last(candidates: Vec<LeadCandidate>) -> Self {
        Self {
            candidates,
            next_cursor: None,
            has_more: false,
        }
    }

    /// 还有后续页面
    pub fn with_next(candidates: Vec<LeadCandidate>, next_cursor: String) -> Self {
        Self {
            candidates,
            next_cursor: Some(next_cursor),
            has_more: true,
        }
    }
}

/// 解析错误
///
/// 携带足够的上下文（字段名或出错片段）以便写入爬取日志
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed {format}: {message}")]
    Malformed { format: &'static str, message: String },

    #[error("missing field `{field}`")]
    MissingField { field: String },

    #[error("unexpected value for `{field}`: {fragment}")]
    UnexpectedValue { field: String, fragment: String },
}

impl ParseError {
    /// 截断后的出错片段，避免把整个响应体写进日志
    pub fn fragment(text: &str) -> String {
        const MAX: usize = 120;
        if text.chars().count() <= MAX {
            text.to_string()
        } else {
            let mut s: String = text.chars().take(MAX).collect();
            s.push_str("...");
            s
        }
    }
}

/// 解析器配置错误
///
/// 在第一次抓取前出现时任务直接失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParserError {
    #[error("unknown source type: {0}")]
    UnknownSourceType(String),

    #[error("invalid site config: {0}")]
    ConfigInvalid(String),
}

/// 线索解析器
///
/// 新增站点类型只需实现本特质并在注册表中登记
pub trait LeadParser: Send + Sync {
    /// 来源类型标签
    fn source_type(&self) -> &'static str;

    /// 构建下一页的请求
    ///
    /// # 参数
    ///
    /// * `config` - 站点配置快照
    /// * `cursor` - 上一页返回的游标，第一页为 None
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchRequest)` - 请求
    /// * `Err(ParserError)` - 配置无法驱动该解析器
    fn build_request(
        &self,
        config: &SiteConfig,
        cursor: Option<&str>,
    ) -> Result<FetchRequest, ParserError>;

    /// 解析响应体
    ///
    /// 纯函数：配置和游标只作为只读上下文，出错时不产生任何部分结果
    ///
    /// # 参数
    ///
    /// * `config` - 站点配置快照
    /// * `cursor` - 本页对应的游标
    /// * `body` - 响应体
    fn parse(
        &self,
        config: &SiteConfig,
        cursor: Option<&str>,
        body: &str,
    ) -> Result<ParsedPage, ParseError>;

    /// 本页解析失败时用于跳过本页的游标
    ///
    /// 只有游标可以独立计算（例如页码）的解析器才能跳页，默认不支持
    fn skip_cursor(&self, _config: &SiteConfig, _cursor: Option<&str>) -> Option<String> {
        None
    }
}

/// 读取字符串过滤项
pub(crate) fn filter_str<'a>(config: &'a SiteConfig, key: &str) -> Option<&'a str> {
    config
        .filters
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// 读取字符串列表过滤项，也接受逗号分隔的单个字符串
pub(crate) fn filter_list(config: &SiteConfig, key: &str) -> Vec<String> {
    match config.filters.get(key) {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(serde_json::Value::String(s)) => s
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// 读取整数过滤项，也接受数字字符串
pub(crate) fn filter_u64(config: &SiteConfig, key: &str) -> Option<u64> {
    match config.filters.get(key)? {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 按字符数截断
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
