// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use redis::RedisError;
use tokio::sync::Mutex;

/// Redis客户端
///
/// 共享计数存储的连接入口，限流器通过它执行原子脚本。
/// 多路复用连接在首次使用时建立，之后所有调用共享同一条连接。
#[derive(Clone)]
pub struct RedisClient {
    /// Redis客户端
    client: redis::Client,
    /// 已建立的连接，克隆开销很小
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
}

impl RedisClient {
    /// 创建新的Redis客户端实例
    ///
    /// 只解析URL，不会立即建立连接，因此存储不可达时进程仍能启动
    ///
    /// # 参数
    ///
    /// * `redis_url` - Redis连接URL
    ///
    /// # 返回值
    ///
    /// * `Ok(RedisClient)` - Redis客户端实例
    /// * `Err(RedisError)` - URL无效
    pub fn new(redis_url: &str) -> Result<Self, RedisError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            connection: Arc::new(Mutex::new(None)),
        })
    }

    /// 获取多路复用的异步连接
    ///
    /// 复用已缓存的连接，尚未连接时才建立新连接。连接失败不会写入缓存。
    ///
    /// # 返回值
    ///
    /// * `Ok(MultiplexedConnection)` - 可用连接
    /// * `Err(RedisError)` - 连接失败
    pub async fn get_connection(&self) -> Result<MultiplexedConnection, RedisError> {
        let mut cached = self.connection.lock().await;
        if let Some(conn) = cached.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *cached = Some(conn.clone());
        Ok(conn)
    }

    /// 丢弃缓存的连接，下一次获取时重新建立
    pub async fn reset_connection(&self) {
        self.connection.lock().await.take();
    }

    /// 检查存储是否可达
    pub async fn ping(&self) -> Result<(), RedisError> {
        let mut con = self.get_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut con).await?;
        Ok(())
    }
}
