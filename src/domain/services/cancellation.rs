// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

/// 运行中任务的协作式取消标志
///
/// 管道每抓取一页检查一次标志，正在进行的请求不会被强行中断
#[derive(Clone, Default)]
pub struct CancellationRegistry {
    flags: Arc<DashMap<Uuid, Arc<AtomicBool>>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为开始运行的任务登记标志
    pub fn register(&self, job_id: Uuid) -> Arc<AtomicBool> {
        self.flags
            .entry(job_id)
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }

    /// 请求取消，任务未在运行时返回 false
    pub fn cancel(&self, job_id: Uuid) -> bool {
        match self.flags.get(&job_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// 取消所有登记的任务，返回受影响的任务数
    pub fn cancel_all(&self) -> usize {
        let mut count = 0;
        for flag in self.flags.iter() {
            flag.store(true, Ordering::SeqCst);
            count += 1;
        }
        count
    }

    pub fn is_cancelled(&self, job_id: Uuid) -> bool {
        self.flags
            .get(&job_id)
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn remove(&self, job_id: Uuid) {
        self.flags.remove(&job_id);
    }

    /// 当前登记的运行中任务数
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
