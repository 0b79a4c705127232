// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含站点配置管理、爬取触发与取消、线索查询等用例
/// 用例只依赖领域层的仓库接口和队列抽象
pub mod dto;
pub mod use_cases;
