// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_app, create_test_app_with_workers, TestApp};
use axum::http::StatusCode;
use leadcrawl::domain::models::lead::LeadCandidate;
use leadcrawl::domain::repositories::lead_repository::LeadRepository;
use serde_json::{json, Value};
use uuid::Uuid;

fn reddit_config(name: &str) -> Value {
    json!({
        "name": name,
        "domain": "reddit.com",
        "source_type": "reddit",
        "filters": {"subreddits": ["rust"], "sort": "new"}
    })
}

async fn create_config(app: &TestApp, body: Value) -> Uuid {
    let response = app.server.post("/v1/configs").json(&body).await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_health_and_version() {
    let app = create_test_app_with_workers(0).await;

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");

    let response = app.server.get("/v1/version").await;
    response.assert_status_ok();
    response.assert_text(env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_site_config_lifecycle() {
    let app = create_test_app_with_workers(0).await;
    let id = create_config(&app, reddit_config("rust subreddit")).await;

    let response = app.server.get(&format!("/v1/configs/{}", id)).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["name"], "rust subreddit");
    assert_eq!(body["source_type"], "reddit");
    assert_eq!(body["enabled"], true);

    let response = app.server.get("/v1/configs").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Vec<Value>>().len(), 1);

    let response = app
        .server
        .put(&format!("/v1/configs/{}/enabled", id))
        .json(&json!({"enabled": false}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["enabled"], false);
}

#[tokio::test]
async fn test_create_site_config_rejects_bad_input() {
    let app = create_test_app_with_workers(0).await;

    let response = app
        .server
        .post("/v1/configs")
        .json(&json!({"name": "", "domain": "reddit.com", "source_type": "reddit"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post("/v1/configs")
        .json(&json!({"name": "x", "domain": "example.com", "source_type": "carrier_pigeon"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"]
        .as_str()
        .unwrap()
        .contains("carrier_pigeon"));

    let mut zero_interval = reddit_config("never");
    zero_interval["crawl_interval_hours"] = json!(0);
    let response = app.server.post("/v1/configs").json(&zero_interval).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .get(&format!("/v1/configs/{}", Uuid::new_v4()))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trigger_and_cancel_pending_job() {
    // 没有 worker，任务停留在 pending
    let app = create_test_app_with_workers(0).await;
    let config_id = create_config(&app, reddit_config("rust")).await;

    let response = app
        .server
        .post(&format!("/v1/configs/{}/crawl", config_id))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let job = response.json::<Value>();
    assert_eq!(job["status"], "pending");
    assert_eq!(job["triggered_by"], "api");
    let job_id = job["id"].as_str().unwrap().to_string();

    let response = app.server.get(&format!("/v1/configs/{}/jobs", config_id)).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Vec<Value>>().len(), 1);

    let response = app.server.delete(&format!("/v1/jobs/{}", job_id)).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({"result": "cancelled"}));

    let response = app.server.get(&format!("/v1/jobs/{}", job_id)).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "cancelled");

    let response = app.server.delete(&format!("/v1/jobs/{}", job_id)).await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        json!({"result": "already_finished", "status": "cancelled"})
    );

    let response = app.server.get(&format!("/v1/jobs/{}/logs", job_id)).await;
    response.assert_status_ok();
    assert!(response.json::<Vec<Value>>().is_empty());
}

#[tokio::test]
async fn test_trigger_errors() {
    let app = create_test_app_with_workers(0).await;

    let response = app
        .server
        .post(&format!("/v1/configs/{}/crawl", Uuid::new_v4()))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let config_id = create_config(&app, reddit_config("rust")).await;
    app.server
        .put(&format!("/v1/configs/{}/enabled", config_id))
        .json(&json!({"enabled": false}))
        .await
        .assert_status_ok();

    let response = app
        .server
        .post(&format!("/v1/configs/{}/crawl", config_id))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let response = app.server.get(&format!("/v1/jobs/{}", Uuid::new_v4())).await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = app
        .server
        .get(&format!("/v1/configs/{}/jobs", config_id))
        .add_query_param("limit", 0)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_leads_listing_and_stats() {
    let app = create_test_app().await;
    for (name, domain, tag) in [
        ("alice", "reddit.com", "rust"),
        ("bob", "reddit.com", "golang"),
        ("carol", "medium.com", "rust"),
    ] {
        app.leads
            .upsert(&LeadCandidate {
                name: name.to_string(),
                profile_url: format!("https://{}/u/{}", domain, name),
                source_domain: domain.to_string(),
                tags: vec![tag.to_string()],
                raw_data: json!({}),
                ..LeadCandidate::default()
            })
            .await
            .unwrap();
    }

    let response = app.server.get("/v1/leads").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Vec<Value>>().len(), 3);

    let response = app
        .server
        .get("/v1/leads")
        .add_query_param("source_domain", "reddit.com")
        .add_query_param("tag", "rust")
        .await;
    response.assert_status_ok();
    let leads = response.json::<Vec<Value>>();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0]["name"], "alice");

    let response = app.server.get("/v1/leads/stats").await;
    response.assert_status_ok();
    let stats = response.json::<Value>();
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["with_email"], 0);
    assert_eq!(stats["by_source"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_lead_lookup_and_search_filters() {
    let app = create_test_app_with_workers(0).await;
    let mut ids = Vec::new();
    for (name, email) in [("alice", "alice@example.com"), ("bob", "")] {
        let outcome = app
            .leads
            .upsert(&LeadCandidate {
                name: name.to_string(),
                role: "Rust Engineer".to_string(),
                email: email.to_string(),
                profile_url: format!("https://people.example.com/{}", name),
                source_domain: "people.example.com".to_string(),
                raw_data: json!({}),
                ..LeadCandidate::default()
            })
            .await
            .unwrap();
        ids.push(outcome.lead_id);
    }

    let response = app.server.get(&format!("/v1/leads/{}", ids[0])).await;
    response.assert_status_ok();
    let lead = response.json::<Value>();
    assert_eq!(lead["name"], "alice");
    assert_eq!(lead["email"], "alice@example.com");

    let response = app.server.get(&format!("/v1/leads/{}", Uuid::new_v4())).await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = app.server.get("/v1/leads").add_query_param("q", "BOB").await;
    response.assert_status_ok();
    let leads = response.json::<Vec<Value>>();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0]["name"], "bob");

    let response = app
        .server
        .get("/v1/leads")
        .add_query_param("has_email", true)
        .add_query_param("created_after", "2020-01-01T00:00:00Z")
        .await;
    response.assert_status_ok();
    let leads = response.json::<Vec<Value>>();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0]["name"], "alice");

    let response = app
        .server
        .get("/v1/leads")
        .add_query_param("created_before", "2020-01-01T00:00:00Z")
        .await;
    response.assert_status_ok();
    assert!(response.json::<Vec<Value>>().is_empty());

    let response = app.server.get("/v1/leads/stats").await;
    response.assert_status_ok();
    let stats = response.json::<Value>();
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["with_email"], 1);
}

#[tokio::test]
async fn test_crawl_stats_and_config_performance() {
    let app = create_test_app_with_workers(0).await;
    let config_id = create_config(&app, reddit_config("rust")).await;
    let disabled_id = create_config(&app, reddit_config("golang")).await;
    app.server
        .put(&format!("/v1/configs/{}/enabled", disabled_id))
        .json(&json!({"enabled": false}))
        .await
        .assert_status_ok();

    // 没有 worker，两个任务都停留在 pending
    for _ in 0..2 {
        app.server
            .post(&format!("/v1/configs/{}/crawl", config_id))
            .await
            .assert_status(StatusCode::ACCEPTED);
    }

    let response = app.server.get("/v1/jobs/stats").await;
    response.assert_status_ok();
    let stats = response.json::<Value>();
    assert_eq!(stats["total_configs"], 2);
    assert_eq!(stats["active_configs"], 1);
    assert_eq!(stats["pending_jobs"], 2);
    assert_eq!(stats["running_jobs"], 0);
    assert_eq!(stats["jobs_24h"]["total"], 2);
    assert_eq!(stats["jobs_7d"]["pending"], 2);

    let response = app
        .server
        .get(&format!("/v1/configs/{}/performance", config_id))
        .await;
    response.assert_status_ok();
    let performance = response.json::<Value>();
    assert_eq!(performance["days"], 7);
    assert_eq!(performance["jobs"]["total"], 2);
    assert_eq!(performance["success_rate"], 0.0);
    assert_eq!(performance["totals"]["pages_fetched"], 0);

    let response = app
        .server
        .get(&format!("/v1/configs/{}/performance", disabled_id))
        .add_query_param("days", 30)
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["jobs"]["total"], 0);

    let response = app
        .server
        .get(&format!("/v1/configs/{}/performance", config_id))
        .add_query_param("days", 0)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .get(&format!("/v1/configs/{}/performance", Uuid::new_v4()))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}
