//! 过敏原高亮类型定义

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::allergen::terms::TermSet;

/// 过敏原目录条目（外部只读）
///
/// 对应记录库中的一个法规类别，两个字段都是逗号分隔的同义词列表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllergenCatalogEntry {
    /// 类别 ID（仅用于保证遍历顺序稳定）
    pub id: i64,
    /// 类别名称（仅用于诊断日志）
    #[serde(default)]
    pub name: Option<String>,
    /// 官方术语
    #[serde(default)]
    pub official_terms: Option<String>,
    /// 常见示例
    #[serde(default)]
    pub common_examples: Option<String>,
}

impl AllergenCatalogEntry {
    pub fn new(id: i64, official_terms: &str, common_examples: &str) -> Self {
        Self {
            id,
            name: None,
            official_terms: Some(official_terms.to_string()),
            common_examples: Some(common_examples.to_string()),
        }
    }

    /// 依次返回官方术语与常见示例的原始字段
    pub fn term_fields(&self) -> impl Iterator<Item = &str> {
        [self.official_terms.as_deref(), self.common_examples.as_deref()]
            .into_iter()
            .flatten()
    }
}

/// 文本片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// 原文片段（保留原始大小写）
    pub text: String,
    /// 是否为过敏原
    pub is_allergen: bool,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_allergen: false,
        }
    }

    pub fn allergen(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_allergen: true,
        }
    }
}

/// 词条来源层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermSource {
    /// 缓存未过期，直接返回
    Fresh,
    /// 本次刷新成功
    Refreshed,
    /// 刷新失败，返回过期缓存
    Stale,
    /// 刷新失败且从未成功过，返回内置词表
    Fallback,
}

impl TermSource {
    /// 是否为降级结果
    pub fn is_degraded(&self) -> bool {
        matches!(self, TermSource::Stale | TermSource::Fallback)
    }
}

/// 词条查询结果
#[derive(Debug, Clone)]
pub struct TermLookup {
    pub terms: Arc<TermSet>,
    pub source: TermSource,
}
