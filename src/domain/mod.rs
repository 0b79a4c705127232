// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：站点配置、爬取任务、线索
/// - 仓库接口（repositories）：数据持久化抽象接口
/// - 服务（services）：限流接口、取消登记与爬取管道
///
/// 领域层只依赖抽象接口，具体实现位于基础设施层和引擎层。
pub mod models;
pub mod repositories;
pub mod services;
