// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use futures::future::join_all;
use leadcrawl::domain::services::rate_limiting_service::RateLimiter;
use leadcrawl::infrastructure::cache::redis_client::RedisClient;
use leadcrawl::infrastructure::services::rate_limiting_service_impl::{
    RedisSlidingWindowLimiter, SlidingWindowConfig,
};
use std::time::Duration;
use testcontainers::core::WaitFor;
use testcontainers::{runners::AsyncRunner, ContainerAsync, GenericImage};

async fn start_redis() -> (ContainerAsync<GenericImage>, String) {
    let node = GenericImage::new("redis", "7-alpine")
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .start()
        .await
        .expect("Failed to start Redis");
    let port = node
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get Redis port");
    (node, format!("redis://127.0.0.1:{}", port))
}

fn limiter(url: &str) -> RedisSlidingWindowLimiter {
    RedisSlidingWindowLimiter::new(
        RedisClient::new(url).unwrap(),
        SlidingWindowConfig {
            key_prefix: "leadcrawl:test".to_string(),
            window: Duration::from_secs(60),
            store_timeout: Duration::from_secs(2),
        },
    )
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_quota_is_enforced_per_domain() {
    let (_node, url) = start_redis().await;
    let limiter = limiter(&url);

    for _ in 0..3 {
        assert!(limiter.admit("reddit.com", 3).await.unwrap().allowed);
    }
    let denied = limiter.admit("reddit.com", 3).await.unwrap();
    assert!(!denied.allowed);
    assert!(denied.retry_after > Duration::ZERO);
    assert!(denied.retry_after <= Duration::from_secs(60));

    // 域名不区分大小写，其他域名不受影响
    assert!(!limiter.admit("Reddit.COM", 3).await.unwrap().allowed);
    assert!(limiter.admit("medium.com", 3).await.unwrap().allowed);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_window_is_shared_between_instances() {
    let (_node, url) = start_redis().await;
    let first = limiter(&url);
    let second = limiter(&url);

    assert!(first.admit("example.com", 2).await.unwrap().allowed);
    assert!(second.admit("example.com", 2).await.unwrap().allowed);
    assert!(!first.admit("example.com", 2).await.unwrap().allowed);
    assert!(!second.admit("example.com", 2).await.unwrap().allowed);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_concurrent_admissions_never_exceed_quota() {
    let (_node, url) = start_redis().await;
    let limiter = limiter(&url);

    let admissions = join_all((0..20).map(|_| limiter.admit("burst.example.com", 5))).await;
    let allowed = admissions
        .into_iter()
        .filter(|a| a.as_ref().unwrap().allowed)
        .count();
    assert_eq!(allowed, 5);
}

/// 服务器累计接受的连接数
async fn connections_received(url: &str) -> u64 {
    let client = redis::Client::open(url).unwrap();
    let mut con = client.get_multiplexed_async_connection().await.unwrap();
    let info: String = redis::cmd("INFO").arg("stats").query_async(&mut con).await.unwrap();
    info.lines()
        .find_map(|line| line.strip_prefix("total_connections_received:"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap()
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_admissions_reuse_one_connection() {
    let (_node, url) = start_redis().await;
    let limiter = limiter(&url);

    let before = connections_received(&url).await;
    for _ in 0..10 {
        limiter.admit("reuse.example.com", 100).await.unwrap();
    }
    let after = connections_received(&url).await;

    // 一条限流连接，加上第二次统计本身的连接
    assert_eq!(after - before, 2);
}
