// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供领域仓库接口的 sea-orm 实现
pub mod crawl_job_repo_impl;
pub mod lead_repo_impl;
pub mod site_config_repo_impl;
