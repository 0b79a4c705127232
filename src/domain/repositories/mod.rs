// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 定义领域层的数据访问接口，具体实现位于基础设施层
pub mod crawl_job_repository;
pub mod lead_repository;
pub mod site_config_repository;
