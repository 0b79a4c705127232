// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::json_api::JsonApiParser;
use super::medium::MediumParser;
use super::reddit::RedditParser;
use super::traits::{LeadParser, ParserError};

/// 解析器注册表
///
/// 来源类型到解析器实现的静态映射，在进程启动时填充
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn LeadParser>>,
}

impl ParserRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建包含内置解析器的注册表
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RedditParser));
        registry.register(Arc::new(MediumParser));
        registry.register(Arc::new(JsonApiParser));
        registry
    }

    /// 注册解析器，同名来源类型会被覆盖
    pub fn register(&mut self, parser: Arc<dyn LeadParser>) {
        let source_type = parser.source_type().to_string();
        info!(source_type = %source_type, "Registered parser");
        self.parsers.insert(source_type, parser);
    }

    /// 查找来源类型对应的解析器
    ///
    /// # 参数
    ///
    /// * `source_type` - 来源类型标签
    ///
    /// # 返回值
    ///
    /// * `Ok(Arc<dyn LeadParser>)` - 解析器
    /// * `Err(ParserError::UnknownSourceType)` - 未注册
    pub fn parser_for(&self, source_type: &str) -> Result<Arc<dyn LeadParser>, ParserError> {
        self.parsers
            .get(source_type)
            .cloned()
            .ok_or_else(|| ParserError::UnknownSourceType(source_type.to_string()))
    }

    pub fn contains(&self, source_type: &str) -> bool {
        self.parsers.contains_key(source_type)
    }

    /// 已注册的来源类型，按名称排序
    pub fn source_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.parsers.keys().cloned().collect();
        types.sort();
        types
    }
}
