// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供任务队列和调度功能
/// 触发者把任务描述放入队列，worker 池从队列取出并执行
pub mod job_queue;
pub mod scheduler;
