// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use url::Url;

use super::reddit::dedupe_last_wins;
use super::traits::{
    filter_list, filter_str, truncate_chars, LeadParser, ParseError, ParsedPage, ParserError,
};
use crate::domain::models::lead::LeadCandidate;
use crate::domain::models::site_config::SiteConfig;
use crate::engines::traits::FetchRequest;

const SOURCE_DOMAIN: &str = "medium.com";
const DEFAULT_BASE_URL: &str = "https://medium.com";
const MAX_TAGS: usize = 20;

/// Medium 标签列表页解析器
///
/// 从文章作者链接、`rel="author"` 链接以及 JSON-LD 中提取作者；
/// 个人主页（og:type = profile）提取主页本人。游标为下一页的绝对URL。
pub struct MediumParser;

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Malformed {
        format: "css",
        message: format!("{}: {:?}", css, e),
    })
}

/// 去掉查询串、片段和结尾斜杠
fn normalize_profile_url(url: &str) -> String {
    let url = url.split(['?', '#']).next().unwrap_or_default();
    url.trim_end_matches('/').to_string()
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn meta_content(doc: &Html, css: &str) -> Result<Option<String>, ParseError> {
    let sel = selector(css)?;
    Ok(doc
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

impl MediumParser {
    fn first_url(config: &SiteConfig) -> Result<String, ParserError> {
        if let Some(seed) = config.start_urls.first() {
            return Ok(seed.clone());
        }
        let tag = filter_list(config, "tags").into_iter().next().ok_or_else(|| {
            ParserError::ConfigInvalid("medium requires a `tags` filter or a start url".to_string())
        })?;
        let base = filter_str(config, "base_url")
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        Ok(format!("{}/tag/{}", base, tag))
    }

    fn page_tags(doc: &Html) -> Result<Vec<String>, ParseError> {
        let sel = selector("a[href*=\"/tag/\"]")?;
        let mut tags: Vec<String> = Vec::new();
        for el in doc.select(&sel) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            let tag = href
                .rsplit("/tag/")
                .next()
                .unwrap_or_default()
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .trim_matches('/');
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
            if tags.len() >= MAX_TAGS {
                break;
            }
        }
        Ok(tags)
    }

    fn profile_candidate(
        doc: &Html,
        page_url: &Url,
        tags: &[String],
    ) -> Result<Option<LeadCandidate>, ParseError> {
        let name = match meta_content(doc, "meta[property=\"og:title\"]")? {
            Some(title) => title
                .replace(" – Medium", "")
                .replace(" - Medium", "")
                .trim()
                .to_string(),
            None => {
                let h1 = selector("h1")?;
                doc.select(&h1).next().map(element_text).unwrap_or_default()
            }
        };
        if name.is_empty() {
            return Ok(None);
        }

        let bio = match meta_content(doc, "meta[name=\"description\"]")? {
            Some(bio) => bio,
            None => meta_content(doc, "meta[property=\"og:description\"]")?.unwrap_or_default(),
        };

        Ok(Some(LeadCandidate {
            name,
            role: truncate_chars(&bio, 200),
            company: String::new(),
            email: String::new(),
            snippet: truncate_chars(&bio, 200),
            tags: tags.to_vec(),
            profile_url: normalize_profile_url(page_url.as_str()),
            source_domain: SOURCE_DOMAIN.to_string(),
            raw_data: json!({ "bio": bio, "scraped_from": page_url.as_str() }),
        }))
    }

    fn author_candidates(
        doc: &Html,
        page_url: &Url,
        tags: &[String],
    ) -> Result<Vec<LeadCandidate>, ParseError> {
        let mut out = Vec::new();

        let links = selector("a[data-testid=\"authorName\"], a[rel=\"author\"]")?;
        for el in doc.select(&links) {
            let name = element_text(el);
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let Ok(profile) = page_url.join(href) else {
                continue;
            };
            out.push(LeadCandidate {
                name,
                tags: tags.to_vec(),
                profile_url: normalize_profile_url(profile.as_str()),
                source_domain: SOURCE_DOMAIN.to_string(),
                raw_data: json!({ "scraped_from": page_url.as_str() }),
                ..Default::default()
            });
        }

        let scripts = selector("script[type=\"application/ld+json\"]")?;
        for el in doc.select(&scripts) {
            let text: String = el.text().collect();
            // 个别脚本格式错误时跳过，不影响整页
            let Ok(data) = serde_json::from_str::<Value>(&text) else {
                continue;
            };
            let authors = match data.get("author") {
                Some(Value::Array(items)) => items.clone(),
                Some(author) if author.is_object() => vec![author.clone()],
                _ => continue,
            };
            for author in authors {
                let Some(name) = author.get("name").and_then(Value::as_str) else {
                    continue;
                };
                let profile = author
                    .get("url")
                    .and_then(Value::as_str)
                    .and_then(|u| page_url.join(u).ok())
                    .unwrap_or_else(|| page_url.clone());
                out.push(LeadCandidate {
                    name: name.trim().to_string(),
                    snippet: data
                        .get("headline")
                        .and_then(Value::as_str)
                        .map(|h| truncate_chars(h, 200))
                        .unwrap_or_default(),
                    tags: tags.to_vec(),
                    profile_url: normalize_profile_url(profile.as_str()),
                    source_domain: SOURCE_DOMAIN.to_string(),
                    raw_data: json!({ "scraped_from": page_url.as_str(), "json_ld": true }),
                    ..Default::default()
                });
            }
        }

        Ok(out)
    }

    fn next_url(doc: &Html, page_url: &Url) -> Result<Option<String>, ParseError> {
        let sel = selector("link[rel=\"next\"], a[rel=\"next\"]")?;
        Ok(doc
            .select(&sel)
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| page_url.join(href).ok())
            .map(|u| u.to_string())
            .find(|u| u != page_url.as_str()))
    }
}

impl LeadParser for MediumParser {
    fn source_type(&self) -> &'static str {
        "medium"
    }

    fn build_request(
        &self,
        config: &SiteConfig,
        cursor: Option<&str>,
    ) -> Result<FetchRequest, ParserError> {
        let raw = match cursor {
            Some(next) => next.to_string(),
            None => Self::first_url(config)?,
        };
        let url = Url::parse(&raw).map_err(|e| ParserError::ConfigInvalid(format!("{}: {}", raw, e)))?;

        Ok(FetchRequest::get(url.to_string())
            .with_header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .with_header("Accept-Language", "en-US,en;q=0.9"))
    }

    fn parse(
        &self,
        config: &SiteConfig,
        cursor: Option<&str>,
        body: &str,
    ) -> Result<ParsedPage, ParseError> {
        if body.trim().is_empty() {
            return Err(ParseError::Malformed {
                format: "html",
                message: "empty document".to_string(),
            });
        }

        let raw_url = match cursor {
            Some(url) => url.to_string(),
            None => Self::first_url(config).map_err(|e| ParseError::UnexpectedValue {
                field: "url".to_string(),
                fragment: e.to_string(),
            })?,
        };
        let page_url = Url::parse(&raw_url).map_err(|e| ParseError::UnexpectedValue {
            field: "url".to_string(),
            fragment: format!("{}: {}", raw_url, e),
        })?;

        let doc = Html::parse_document(body);
        let tags = Self::page_tags(&doc)?;

        let is_profile = meta_content(&doc, "meta[property=\"og:type\"]")?.as_deref()
            == Some("profile")
            || page_url.path().starts_with("/@");

        let candidates = if is_profile {
            Self::profile_candidate(&doc, &page_url, &tags)?
                .into_iter()
                .collect()
        } else {
            Self::author_candidates(&doc, &page_url, &tags)?
        };

        let candidates = dedupe_last_wins(candidates);
        Ok(match Self::next_url(&doc, &page_url)? {
            Some(next) => ParsedPage::with_next(candidates, next),
            None => ParsedPage::last(candidates),
        })
    }
}

#[cfg(test)]
#[path = "medium_test.rs"]
mod tests;
