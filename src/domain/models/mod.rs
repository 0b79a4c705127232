// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 定义站点配置、爬取任务、任务日志与线索等核心业务实体
pub mod crawl_job;
pub mod lead;
pub mod site_config;
