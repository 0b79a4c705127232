// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde_json::Value;
use url::Url;

use super::reddit::dedupe_last_wins;
use super::traits::{filter_str, filter_u64, LeadParser, ParseError, ParsedPage, ParserError};
use crate::domain::models::lead::LeadCandidate;
use crate::domain::models::site_config::SiteConfig;
use crate::engines::traits::FetchRequest;

/// 通用页码分页 JSON 接口解析器
///
/// 完全由过滤项描述：
///
/// * `endpoint` - 列表接口地址，缺省时使用第一个种子URL
/// * `page_param` / `start_page` - 页码参数名（默认 `page`）与起始页（默认 1）
/// * `page_size_param` / `page_size` - 可选的分页大小参数
/// * `items_path` - 条目数组所在的点分路径，缺省时响应体本身即数组
/// * `has_more_path` - 可选的布尔字段路径
/// * `fields` - 字段映射（name、profile_url、role、company、email、snippet、tags），
///   `name` 与 `profile_url` 必填
/// * `query` / `headers` - 附加的查询参数与请求头
///
/// 游标是页码，可以独立计算，因此支持跳过解析失败的页面。
pub struct JsonApiParser;

/// 按点分路径取值，数字段用于数组下标
fn value_at<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => current.get(segment),
    })
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl JsonApiParser {
    fn endpoint(config: &SiteConfig) -> Result<String, ParserError> {
        filter_str(config, "endpoint")
            .map(str::to_string)
            .or_else(|| config.start_urls.first().cloned())
            .ok_or_else(|| {
                ParserError::ConfigInvalid("json_api requires an `endpoint` filter".to_string())
            })
    }

    fn start_page(config: &SiteConfig) -> u64 {
        filter_u64(config, "start_page").unwrap_or(1)
    }

    fn page_of(config: &SiteConfig, cursor: Option<&str>) -> Result<u64, String> {
        match cursor {
            None => Ok(Self::start_page(config)),
            Some(c) => c
                .parse::<u64>()
                .map_err(|_| format!("cursor `{}` is not a page number", c)),
        }
    }

    fn field_path<'a>(config: &'a SiteConfig, name: &str) -> Option<&'a str> {
        config
            .filters
            .get("fields")
            .and_then(|f| f.get(name))
            .and_then(Value::as_str)
    }

    fn text_field(
        config: &SiteConfig,
        item: &Value,
        index: usize,
        name: &str,
        required: bool,
    ) -> Result<String, ParseError> {
        let path = Self::field_path(config, name).unwrap_or(name);
        match value_at(item, path).and_then(as_text).filter(|s| !s.is_empty()) {
            Some(text) => Ok(text),
            None if required => Err(ParseError::MissingField {
                field: format!("items[{}].{}", index, path),
            }),
            None => Ok(String::new()),
        }
    }

    fn tags_field(config: &SiteConfig, item: &Value) -> Vec<String> {
        let path = Self::field_path(config, "tags").unwrap_or("tags");
        match value_at(item, path) {
            Some(Value::Array(items)) => items.iter().filter_map(as_text).filter(|s| !s.is_empty()).collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl LeadParser for JsonApiParser {
    fn source_type(&self) -> &'static str {
        "json_api"
    }

    fn build_request(
        &self,
        config: &SiteConfig,
        cursor: Option<&str>,
    ) -> Result<FetchRequest, ParserError> {
        let endpoint = Self::endpoint(config)?;
        let page = Self::page_of(config, cursor).map_err(ParserError::ConfigInvalid)?;
        let mut url = Url::parse(&endpoint)
            .map_err(|e| ParserError::ConfigInvalid(format!("endpoint {}: {}", endpoint, e)))?;

        {
            let mut query = url.query_pairs_mut();
            if let Some(extra) = config.filters.get("query").and_then(Value::as_object) {
                for (k, v) in extra {
                    if let Some(v) = as_text(v) {
                        query.append_pair(k, &v);
                    }
                }
            }
            let page_param = filter_str(config, "page_param").unwrap_or("page");
            query.append_pair(page_param, &page.to_string());
            if let (Some(param), Some(size)) = (
                filter_str(config, "page_size_param"),
                filter_u64(config, "page_size"),
            ) {
                query.append_pair(param, &size.to_string());
            }
        }

        let mut request = FetchRequest::get(url.to_string()).with_header("Accept", "application/json");
        if let Some(headers) = config.filters.get("headers").and_then(Value::as_object) {
            for (k, v) in headers {
                if let Some(v) = v.as_str() {
                    request = request.with_header(k.clone(), v);
                }
            }
        }
        Ok(request)
    }

    fn parse(
        &self,
        config: &SiteConfig,
        cursor: Option<&str>,
        body: &str,
    ) -> Result<ParsedPage, ParseError> {
        let page = Self::page_of(config, cursor).map_err(|e| ParseError::UnexpectedValue {
            field: "cursor".to_string(),
            fragment: e,
        })?;

        let value: Value = serde_json::from_str(body).map_err(|e| ParseError::Malformed {
            format: "json",
            message: format!("{} near `{}`", e, ParseError::fragment(body)),
        })?;

        let items_path = filter_str(config, "items_path").unwrap_or("");
        let items = value_at(&value, items_path)
            .ok_or_else(|| ParseError::MissingField {
                field: items_path.to_string(),
            })?
            .as_array()
            .ok_or_else(|| ParseError::UnexpectedValue {
                field: if items_path.is_empty() { "$".to_string() } else { items_path.to_string() },
                fragment: ParseError::fragment(&value.to_string()),
            })?;

        let mut candidates = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            candidates.push(LeadCandidate {
                name: Self::text_field(config, item, index, "name", true)?,
                profile_url: Self::text_field(config, item, index, "profile_url", true)?,
                role: Self::text_field(config, item, index, "role", false)?,
                company: Self::text_field(config, item, index, "company", false)?,
                email: Self::text_field(config, item, index, "email", false)?,
                snippet: Self::text_field(config, item, index, "snippet", false)?,
                tags: Self::tags_field(config, item),
                source_domain: config.domain.clone(),
                raw_data: item.clone(),
            });
        }

        let has_more = match filter_str(config, "has_more_path") {
            Some(path) => match value_at(&value, path) {
                Some(Value::Bool(b)) => *b,
                Some(other) => {
                    return Err(ParseError::UnexpectedValue {
                        field: path.to_string(),
                        fragment: ParseError::fragment(&other.to_string()),
                    })
                }
                None => false,
            },
            // 没有显式标志时，返回满页才认为还有下一页
            None => match filter_u64(config, "page_size") {
                Some(size) => items.len() as u64 >= size && !items.is_empty(),
                None => !items.is_empty(),
            },
        };

        let candidates = dedupe_last_wins(candidates);
        // 页码已到上限时视为最后一页
        Ok(match page.checked_add(1) {
            Some(next) if has_more => ParsedPage::with_next(candidates, next.to_string()),
            _ => ParsedPage::last(candidates),
        })
    }

    fn skip_cursor(&self, config: &SiteConfig, cursor: Option<&str>) -> Option<String> {
        Self::page_of(config, cursor)
            .ok()
            .and_then(|page| page.checked_add(1))
            .map(|next| next.to_string())
    }
}

#[cfg(test)]
#[path = "json_api_test.rs"]
mod tests;
