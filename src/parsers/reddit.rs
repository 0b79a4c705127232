// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;

use serde_json::{json, Value};
use url::Url;

use super::traits::{
    filter_list, filter_str, filter_u64, truncate_chars, LeadParser, ParseError, ParsedPage,
    ParserError,
};
use crate::domain::models::lead::LeadCandidate;
use crate::domain::models::site_config::SiteConfig;
use crate::engines::traits::FetchRequest;

const SOURCE_DOMAIN: &str = "reddit.com";
const DEFAULT_BASE_URL: &str = "https://www.reddit.com";
const SORTS: [&str; 4] = ["hot", "new", "top", "rising"];
const IGNORED_AUTHORS: [&str; 3] = ["[deleted]", "[removed]", "AutoModerator"];

/// Reddit 公开 JSON 列表解析器
///
/// 过滤项：`subreddits`、`sort`（hot/new/top/rising）、`limit`（1-100）。
/// 游标为列表返回的 `after`。
pub struct RedditParser;

impl RedditParser {
    fn listing_url(config: &SiteConfig) -> Result<Url, ParserError> {
        let subreddits = filter_list(config, "subreddits");
        if subreddits.is_empty() {
            // 没有子版块时退回到第一个种子URL
            let seed = config.start_urls.first().ok_or_else(|| {
                ParserError::ConfigInvalid(
                    "reddit requires a `subreddits` filter or a start url".to_string(),
                )
            })?;
            return Url::parse(&to_json_url(seed))
                .map_err(|e| ParserError::ConfigInvalid(format!("start url {}: {}", seed, e)));
        }

        let sort = filter_str(config, "sort").unwrap_or("hot");
        if !SORTS.contains(&sort) {
            return Err(ParserError::ConfigInvalid(format!(
                "reddit sort must be one of {:?}, got {}",
                SORTS, sort
            )));
        }

        let base = filter_str(config, "base_url")
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        let raw = format!("{}/r/{}/{}.json", base, subreddits.join("+"), sort);
        Url::parse(&raw).map_err(|e| ParserError::ConfigInvalid(format!("{}: {}", raw, e)))
    }

    fn candidate(kind: &str, data: &Value) -> Option<LeadCandidate> {
        let author = data.get("author").and_then(Value::as_str)?.trim();
        if author.is_empty() || IGNORED_AUTHORS.contains(&author) {
            return None;
        }

        let subreddit = data
            .get("subreddit")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let is_post = kind == "t3";
        let text_field = if is_post { "title" } else { "body" };
        let snippet = truncate_chars(
            data.get(text_field).and_then(Value::as_str).unwrap_or_default(),
            200,
        );

        Some(LeadCandidate {
            name: author.to_string(),
            role: "Reddit User".to_string(),
            company: String::new(),
            email: String::new(),
            snippet,
            tags: if subreddit.is_empty() {
                Vec::new()
            } else {
                vec![subreddit.clone()]
            },
            profile_url: format!("https://www.reddit.com/user/{}", author),
            source_domain: SOURCE_DOMAIN.to_string(),
            raw_data: json!({
                "subreddit": subreddit,
                "id": data.get("id").cloned().unwrap_or(Value::Null),
                "score": data.get("score").cloned().unwrap_or(json!(0)),
                "created_utc": data.get("created_utc").cloned().unwrap_or(json!(0)),
                "is_post_author": is_post,
            }),
        })
    }

    /// 遍历一个列表，评论的回复递归展开
    fn walk_listing(
        listing: &Value,
        path: &str,
        out: &mut Vec<LeadCandidate>,
    ) -> Result<(), ParseError> {
        let data = listing.get("data").ok_or_else(|| ParseError::MissingField {
            field: format!("{}data", path),
        })?;
        let children = data
            .get("children")
            .and_then(Value::as_array)
            .ok_or_else(|| ParseError::MissingField {
                field: format!("{}data.children", path),
            })?;

        for child in children {
            let kind = child.get("kind").and_then(Value::as_str).unwrap_or_default();
            let Some(child_data) = child.get("data") else {
                continue;
            };
            match kind {
                "t3" | "t1" => {
                    if let Some(candidate) = Self::candidate(kind, child_data) {
                        out.push(candidate);
                    }
                    if let Some(replies) = child_data.get("replies").filter(|r| r.is_object()) {
                        Self::walk_listing(replies, "replies.", out)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// 把 Reddit 页面URL转换为 .json 端点
fn to_json_url(url: &str) -> String {
    let (base, query) = match url.split_once('?') {
        Some((b, q)) => (b, Some(q)),
        None => (url, None),
    };
    let base = base.trim_end_matches('/');
    let base = if base.ends_with(".json") {
        base.to_string()
    } else {
        format!("{}.json", base)
    };
    match query {
        Some(q) => format!("{}?{}", base, q),
        None => base,
    }
}

/// 同一页内按 profile_url 去重，保留最后一次出现的字段
pub(crate) fn dedupe_last_wins(candidates: Vec<LeadCandidate>) -> Vec<LeadCandidate> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<LeadCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match positions.get(&candidate.profile_url) {
            Some(&i) => out[i] = candidate,
            None => {
                positions.insert(candidate.profile_url.clone(), out.len());
                out.push(candidate);
            }
        }
    }
    out
}

impl LeadParser for RedditParser {
    fn source_type(&self) -> &'static str {
        "reddit"
    }

    fn build_request(
        &self,
        config: &SiteConfig,
        cursor: Option<&str>,
    ) -> Result<FetchRequest, ParserError> {
        let mut url = Self::listing_url(config)?;
        let limit = filter_u64(config, "limit").unwrap_or(25).clamp(1, 100);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(after) = cursor {
                query.append_pair("after", after);
            }
        }

        Ok(FetchRequest::get(url.to_string()).with_header("Accept", "application/json"))
    }

    fn parse(
        &self,
        _config: &SiteConfig,
        _cursor: Option<&str>,
        body: &str,
    ) -> Result<ParsedPage, ParseError> {
        let value: Value = serde_json::from_str(body).map_err(|e| ParseError::Malformed {
            format: "json",
            message: format!("{} near `{}`", e, ParseError::fragment(body)),
        })?;

        let mut candidates = Vec::new();
        let after = match &value {
            // 帖子详情页返回 [帖子列表, 评论列表]
            Value::Array(listings) => {
                for listing in listings {
                    Self::walk_listing(listing, "", &mut candidates)?;
                }
                None
            }
            Value::Object(_) => {
                Self::walk_listing(&value, "", &mut candidates)?;
                value
                    .pointer("/data/after")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            }
            other => {
                return Err(ParseError::UnexpectedValue {
                    field: "$".to_string(),
                    fragment: ParseError::fragment(&other.to_string()),
                })
            }
        };

        let candidates = dedupe_last_wins(candidates);
        Ok(match after {
            Some(after) => ParsedPage::with_next(candidates, after),
            None => ParsedPage::last(candidates),
        })
    }
}

#[cfg(test)]
#[path = "reddit_test.rs"]
mod tests;
