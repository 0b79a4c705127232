// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_app, wait_for_terminal};
use axum::http::StatusCode;
use leadcrawl::domain::models::crawl_job::{CrawlJob, CrawlJobStatus, LogOutcome};
use leadcrawl::domain::repositories::crawl_job_repository::CrawlJobRepository;
use leadcrawl::domain::repositories::lead_repository::LeadRepository;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn people(names: &[&str], role: &str, has_more: bool) -> Value {
    let items: Vec<_> = names
        .iter()
        .map(|name| {
            json!({
                "user": {"name": name, "url": format!("https://people.example.com/{}", name)},
                "title": role,
                "labels": ["rust"]
            })
        })
        .collect();
    json!({"data": {"items": items}, "meta": {"has_more": has_more}})
}

async fn mount_page(server: &MockServer, page: &str, body: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path("/people"))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

fn json_api_config(server: &MockServer, max_pages: u32) -> Value {
    json!({
        "name": "people directory",
        "domain": "people.example.com",
        "source_type": "json_api",
        "max_pages": max_pages,
        "requests_per_minute": 600,
        "filters": {
            "endpoint": format!("{}/people", server.uri()),
            "items_path": "data.items",
            "has_more_path": "meta.has_more",
            "fields": {
                "name": "user.name",
                "profile_url": "user.url",
                "role": "title",
                "tags": "labels"
            }
        }
    })
}

async fn trigger(app: &super::helpers::TestApp, config: Value) -> CrawlJob {
    let created = app.server.post("/v1/configs").json(&config).await;
    created.assert_status(StatusCode::CREATED);
    let config_id: Uuid = created.json::<Value>()["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let response = app
        .server
        .post(&format!("/v1/configs/{}/crawl", config_id))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    response.json::<CrawlJob>()
}

#[tokio::test]
async fn test_three_pages_with_repeated_leads_complete() {
    let server = MockServer::start().await;
    mount_page(&server, "1", people(&["a", "b", "c", "d", "e"], "dev", true), 1).await;
    mount_page(&server, "2", people(&["f", "g", "h", "i", "j"], "dev", true), 1).await;
    mount_page(&server, "3", people(&["a", "b", "c"], "lead", true), 1).await;

    let app = create_test_app().await;
    let job = trigger(&app, json_api_config(&server, 3)).await;
    assert_eq!(job.triggered_by, "api");

    let job = wait_for_terminal(&app.jobs, job.id).await;
    assert_eq!(job.status, CrawlJobStatus::Completed);
    assert_eq!(job.stats.pages_fetched, 3);
    assert_eq!(job.stats.leads_found, 10);
    assert_eq!(job.stats.leads_updated, 3);
    assert_eq!(job.stats.error_count, 0);
    assert_eq!(app.leads.count().await.unwrap(), 10);

    let lead = app
        .leads
        .find_by_natural_key("https://people.example.com/a", "people.example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lead.role, "lead");
    assert_eq!(lead.tags, vec!["rust".to_string()]);

    let logs = app.server.get(&format!("/v1/jobs/{}/logs", job.id)).await;
    logs.assert_status_ok();
    let logs = logs.json::<Vec<Value>>();
    assert_eq!(logs.len(), 3);
    assert!(logs.iter().all(|l| l["outcome"] == "success"));
}

#[tokio::test]
async fn test_server_error_after_first_page_is_partial() {
    let server = MockServer::start().await;
    mount_page(&server, "1", people(&["a", "b"], "dev", true), 1).await;
    // 抓取器内部重试三次后放弃
    Mock::given(method("GET"))
        .and(path("/people"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let app = create_test_app().await;
    let job = trigger(&app, json_api_config(&server, 5)).await;

    let job = wait_for_terminal(&app.jobs, job.id).await;
    assert_eq!(job.status, CrawlJobStatus::Partial);
    assert_eq!(job.stats.pages_fetched, 1);
    assert_eq!(job.stats.error_count, 1);
    assert!(job.error_message.is_some());

    let logs = app.jobs.list_logs(job.id).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].outcome, LogOutcome::Success);
    assert_eq!(logs[1].outcome, LogOutcome::FetchError);
    assert_eq!(logs[1].http_status, Some(500));
    assert_eq!(logs[1].retries, 2);
    assert_eq!(app.leads.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_malformed_page_is_skipped() {
    let server = MockServer::start().await;
    mount_page(&server, "1", people(&["a"], "dev", true), 1).await;
    Mock::given(method("GET"))
        .and(path("/people"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "3", people(&["b"], "dev", false), 1).await;

    let app = create_test_app().await;
    let job = trigger(&app, json_api_config(&server, 10)).await;

    let job = wait_for_terminal(&app.jobs, job.id).await;
    assert_eq!(job.status, CrawlJobStatus::Completed);
    assert_eq!(job.stats.pages_fetched, 3);
    assert_eq!(job.stats.error_count, 1);
    assert_eq!(app.leads.count().await.unwrap(), 2);

    let logs = app.jobs.list_logs(job.id).await.unwrap();
    assert_eq!(logs[1].outcome, LogOutcome::ParseError);
}

#[tokio::test]
async fn test_reddit_listing_pagination() {
    let server = MockServer::start().await;
    let listing = |authors: &[&str], after: Option<&str>| {
        let children: Vec<_> = authors
            .iter()
            .enumerate()
            .map(|(i, author)| {
                json!({"kind": "t3", "data": {
                    "author": author,
                    "subreddit": "rust",
                    "id": format!("p{}", i),
                    "title": "Show r/rust: a crawler",
                    "score": 10
                }})
            })
            .collect();
        json!({"kind": "Listing", "data": {"children": children, "after": after}})
    };

    Mock::given(method("GET"))
        .and(path("/r/rust/new.json"))
        .and(query_param("after", "t3_next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(&["carol", "[deleted]"], None)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/rust/new.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(
            &["alice", "AutoModerator", "bob"],
            Some("t3_next"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_test_app().await;
    let job = trigger(
        &app,
        json!({
            "name": "r/rust",
            "domain": "reddit.com",
            "source_type": "reddit",
            "requests_per_minute": 600,
            "filters": {"subreddits": ["rust"], "sort": "new", "base_url": server.uri()}
        }),
    )
    .await;

    let job = wait_for_terminal(&app.jobs, job.id).await;
    assert_eq!(job.status, CrawlJobStatus::Completed);
    assert_eq!(job.stats.pages_fetched, 2);
    assert_eq!(job.stats.leads_found, 3);

    let leads = app.server.get("/v1/leads").add_query_param("tag", "rust").await;
    leads.assert_status_ok();
    let names: Vec<String> = leads
        .json::<Vec<Value>>()
        .iter()
        .map(|l| l["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names.len(), 3);
    assert!(names.contains(&"carol".to_string()));
    assert!(!names.iter().any(|n| n == "AutoModerator"));
}

#[tokio::test]
async fn test_shutdown_cancels_running_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/people"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(people(&["a", "b"], "dev", true))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let app = create_test_app().await;
    let job = trigger(&app, json_api_config(&server, 50)).await;

    // 等第一页写入后再关闭
    let mut started = false;
    for _ in 0..100 {
        let current = app.jobs.find_by_id(job.id).await.unwrap().unwrap();
        if current.status == CrawlJobStatus::Running && current.stats.pages_fetched >= 1 {
            started = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(started, "job never fetched its first page");

    let super::helpers::TestApp {
        worker_manager,
        jobs,
        ..
    } = app;
    worker_manager.shutdown(Duration::from_secs(5)).await;

    let job = jobs.find_by_id(job.id).await.unwrap().unwrap();
    assert!(job.status.is_terminal());
    assert_eq!(job.status, CrawlJobStatus::Partial);
    assert_eq!(job.error_message.as_deref(), Some("cancelled"));
    assert!(job.finished_at.is_some());
    assert!(job.stats.pages_fetched < 50);
}
