// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 线索解析器模块
///
/// 来源类型到解析器的注册表，以及内置的 reddit、medium、json_api 解析器
pub mod json_api;
pub mod medium;
pub mod reddit;
pub mod registry;
pub mod traits;
