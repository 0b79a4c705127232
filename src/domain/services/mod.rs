// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 取消登记（cancellation）：运行中任务的协作式取消标志
/// - 爬取管道（crawl_pipeline）：驱动单个任务的分页抓取循环
/// - 限流接口（rate_limiting_service）：按域名的滑动窗口准入抽象
pub mod cancellation;
pub mod crawl_pipeline;
pub mod rate_limiting_service;
