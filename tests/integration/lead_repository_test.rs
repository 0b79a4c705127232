// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::setup_db;
use chrono::{Duration, Utc};
use futures::future::join_all;
use leadcrawl::domain::models::lead::{LeadCandidate, LeadQuery};
use leadcrawl::domain::repositories::lead_repository::LeadRepository;
use leadcrawl::infrastructure::repositories::lead_repo_impl::LeadRepositoryImpl;
use serde_json::json;
use std::sync::Arc;

fn candidate(name: &str, domain: &str, tags: &[&str]) -> LeadCandidate {
    LeadCandidate {
        name: name.to_string(),
        role: "Engineer".to_string(),
        company: String::new(),
        email: String::new(),
        snippet: format!("{} posted something", name),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        profile_url: format!("https://{}/u/{}", domain, name.to_lowercase()),
        source_domain: domain.to_string(),
        raw_data: json!({"source": "test"}),
    }
}

#[tokio::test]
async fn test_upsert_creates_then_updates() {
    let repo = LeadRepositoryImpl::new(setup_db().await);

    let first = repo.upsert(&candidate("Alice", "reddit.com", &["rust"])).await.unwrap();
    assert!(first.created);
    let original = repo
        .find_by_natural_key("https://reddit.com/u/alice", "reddit.com")
        .await
        .unwrap()
        .unwrap();

    let mut changed = candidate("Alice", "reddit.com", &["rust", "wasm"]);
    changed.role = "Staff Engineer".to_string();
    let second = repo.upsert(&changed).await.unwrap();
    assert!(!second.created);
    assert_eq!(second.lead_id, first.lead_id);

    let updated = repo
        .find_by_natural_key("https://reddit.com/u/alice", "reddit.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.id, original.id);
    assert_eq!(updated.created_at, original.created_at);
    assert!(updated.updated_at >= original.updated_at);
    assert_eq!(updated.role, "Staff Engineer");
    assert_eq!(updated.tags, vec!["rust".to_string(), "wasm".to_string()]);
    assert_eq!(repo.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_identical_candidate_twice_is_one_lead() {
    let repo = LeadRepositoryImpl::new(setup_db().await);
    let mut lead = candidate("Erin", "medium.com", &["rust", "databases"]);
    lead.company = "Ferrous Labs".to_string();
    lead.email = "erin@ferrous.example".to_string();
    lead.raw_data = json!({"bio": "builds storage engines", "followers": 42});

    let first = repo.upsert(&lead).await.unwrap();
    let second = repo.upsert(&lead).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(second.lead_id, first.lead_id);
    assert_eq!(repo.count().await.unwrap(), 1);

    let stored = repo.find_by_id(first.lead_id).await.unwrap().unwrap();
    assert_eq!(stored.name, lead.name);
    assert_eq!(stored.role, lead.role);
    assert_eq!(stored.company, lead.company);
    assert_eq!(stored.email, lead.email);
    assert_eq!(stored.snippet, lead.snippet);
    assert_eq!(stored.tags, lead.tags);
    assert_eq!(stored.raw_data, lead.raw_data);
    assert_eq!(stored.profile_url, lead.profile_url);
    assert_eq!(stored.source_domain, lead.source_domain);
}

#[tokio::test]
async fn test_same_profile_on_other_domain_is_distinct() {
    let repo = LeadRepositoryImpl::new(setup_db().await);

    let mut on_medium = candidate("Alice", "medium.com", &[]);
    on_medium.profile_url = "https://reddit.com/u/alice".to_string();

    assert!(repo.upsert(&candidate("Alice", "reddit.com", &[])).await.unwrap().created);
    assert!(repo.upsert(&on_medium).await.unwrap().created);
    assert_eq!(repo.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_upserts_create_exactly_once() {
    let repo = Arc::new(LeadRepositoryImpl::new(setup_db().await));

    let outcomes = join_all((0..8).map(|_| {
        let repo = repo.clone();
        async move {
            repo.upsert(&candidate("Bob", "reddit.com", &["golang"]))
                .await
                .unwrap()
        }
    }))
    .await;

    let created = outcomes.iter().filter(|o| o.created).count();
    let ids: Vec<_> = outcomes.iter().map(|o| o.lead_id).collect();

    assert_eq!(created, 1);
    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(repo.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_query_filters_and_counts() {
    let repo = LeadRepositoryImpl::new(setup_db().await);
    repo.upsert(&candidate("Alice", "reddit.com", &["rust"])).await.unwrap();
    repo.upsert(&candidate("Bob", "reddit.com", &["Golang"])).await.unwrap();
    repo.upsert(&candidate("Carol", "medium.com", &["rust"])).await.unwrap();
    repo.upsert(&candidate("Dave", "medium.com", &[])).await.unwrap();

    let all = repo.query(&LeadQuery::default()).await.unwrap();
    assert_eq!(all.len(), 4);

    let reddit = repo
        .query(&LeadQuery {
            source_domain: Some("reddit.com".to_string()),
            ..LeadQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(reddit.len(), 2);

    let golang = repo
        .query(&LeadQuery {
            tag: Some("golang".to_string()),
            ..LeadQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(golang.len(), 1);
    assert_eq!(golang[0].name, "Bob");

    let rust_page = repo
        .query(&LeadQuery {
            tag: Some("rust".to_string()),
            limit: Some(1),
            offset: Some(1),
            ..LeadQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(rust_page.len(), 1);

    let counts = repo.count_by_source().await.unwrap();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].source_domain, "medium.com");
    assert_eq!(counts[0].count, 2);
    assert_eq!(counts[1].source_domain, "reddit.com");
    assert_eq!(counts[1].count, 2);
}

#[tokio::test]
async fn test_search_email_and_date_filters() {
    let repo = LeadRepositoryImpl::new(setup_db().await);

    let mut alice = candidate("Alice", "reddit.com", &["rust"]);
    alice.email = "alice@example.com".to_string();
    alice.company = "Oxide Works".to_string();
    repo.upsert(&alice).await.unwrap();

    let mut bob = candidate("Bob", "reddit.com", &["rust"]);
    bob.role = "Kernel Hacker".to_string();
    repo.upsert(&bob).await.unwrap();

    repo.upsert(&candidate("Carol", "medium.com", &["rust"])).await.unwrap();

    let search = |text: &str| LeadQuery {
        q: Some(text.to_string()),
        ..LeadQuery::default()
    };
    // 不区分大小写，匹配姓名、职位、公司或邮箱
    let by_company = repo.query(&search("oxide")).await.unwrap();
    assert_eq!(by_company.len(), 1);
    assert_eq!(by_company[0].name, "Alice");
    let by_role = repo.query(&search("KERNEL")).await.unwrap();
    assert_eq!(by_role.len(), 1);
    assert_eq!(by_role[0].name, "Bob");
    assert_eq!(repo.query(&search("carol")).await.unwrap().len(), 1);
    assert!(repo.query(&search("nobody")).await.unwrap().is_empty());

    let with_email = repo
        .query(&LeadQuery {
            has_email: Some(true),
            ..LeadQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(with_email.len(), 1);
    assert!(with_email[0].has_email());
    let without_email = repo
        .query(&LeadQuery {
            has_email: Some(false),
            source_domain: Some("reddit.com".to_string()),
            ..LeadQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(without_email.len(), 1);
    assert_eq!(without_email[0].name, "Bob");
    assert_eq!(repo.count_with_email().await.unwrap(), 1);

    let future = Utc::now() + Duration::hours(1);
    let past = Utc::now() - Duration::hours(1);
    let created_later = repo
        .query(&LeadQuery {
            created_after: Some(future),
            ..LeadQuery::default()
        })
        .await
        .unwrap();
    assert!(created_later.is_empty());
    let in_range = repo
        .query(&LeadQuery {
            created_after: Some(past),
            created_before: Some(future),
            tag: Some("rust".to_string()),
            ..LeadQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(in_range.len(), 3);

    assert!(repo.find_by_id(uuid::Uuid::new_v4()).await.unwrap().is_none());
}
