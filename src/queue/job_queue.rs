// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// 队列中的任务描述
///
/// 只携带标识，任务的状态以存储中的记录为准
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: Uuid,
    pub site_config_id: Uuid,
}

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 所有消费者都已退出
    #[error("Job queue is closed")]
    Closed,
}

/// 任务队列特质
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// 入队任务描述，队列满时等待空位
    async fn enqueue(&self, descriptor: JobDescriptor) -> Result<(), QueueError>;

    /// 出队任务描述
    ///
    /// # 返回值
    ///
    /// * `Some(JobDescriptor)` - 下一个任务
    /// * `None` - 队列已关闭且没有剩余任务
    async fn dequeue(&self) -> Option<JobDescriptor>;
}

/// 基于 tokio mpsc 通道的进程内任务队列
///
/// 多个 worker 共享同一个接收端，每个描述只会被一个 worker 取走
pub struct ChannelJobQueue {
    sender: mpsc::Sender<JobDescriptor>,
    receiver: Mutex<mpsc::Receiver<JobDescriptor>>,
}

impl ChannelJobQueue {
    /// 创建新的通道队列
    ///
    /// # 参数
    ///
    /// * `capacity` - 通道容量，至少为 1
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// 当前排队中的描述数量
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobQueue for ChannelJobQueue {
    async fn enqueue(&self, descriptor: JobDescriptor) -> Result<(), QueueError> {
        self.sender
            .send(descriptor)
            .await
            .map_err(|_| QueueError::Closed)
    }

    async fn dequeue(&self) -> Option<JobDescriptor> {
        self.receiver.lock().await.recv().await
    }
}

#[async_trait]
impl<T: JobQueue + ?Sized> JobQueue for Arc<T> {
    async fn enqueue(&self, descriptor: JobDescriptor) -> Result<(), QueueError> {
        (**self).enqueue(descriptor).await
    }

    async fn dequeue(&self) -> Option<JobDescriptor> {
        (**self).dequeue().await
    }
}
