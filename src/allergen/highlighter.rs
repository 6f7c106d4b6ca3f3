//! 过敏原高亮入口
//!
//! UI 层唯一调用的接口：先取词条，再切分文本，永不失败

use std::sync::Arc;

use crate::allergen::cache::{AllergenCatalog, CachePolicy, TermCatalogCache};
use crate::allergen::segmenter::TextSegmenter;
use crate::allergen::types::Run;
use crate::config::HighlightConfig;

/// 过敏原高亮器（可克隆，克隆体共享缓存）
#[derive(Clone)]
pub struct AllergenHighlighter {
    cache: TermCatalogCache,
    segmenter: TextSegmenter,
}

impl AllergenHighlighter {
    pub fn new(cache: TermCatalogCache, segmenter: TextSegmenter) -> Self {
        Self { cache, segmenter }
    }

    /// 按配置创建
    pub fn from_config(config: &HighlightConfig, catalog: Arc<dyn AllergenCatalog>) -> Self {
        let policy = CachePolicy {
            ttl: config.cache_ttl(),
            fetch_timeout: config.fetch_timeout(),
        };
        Self::new(
            TermCatalogCache::new(catalog, policy),
            TextSegmenter::new(config.max_text_len),
        )
    }

    pub fn cache(&self) -> &TermCatalogCache {
        &self.cache
    }

    /// 高亮文本中的过敏原
    pub async fn highlight(&self, text: &str) -> Vec<Run> {
        if text.is_empty() {
            return Vec::new();
        }

        let terms = self.cache.get_terms().await;
        self.segmenter.segment(text, &terms)
    }

    /// 批量高亮，所有文本共用同一份词条快照
    pub async fn highlight_all<'a, I>(&self, texts: I) -> Vec<Vec<Run>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let terms = self.cache.get_terms().await;
        texts
            .into_iter()
            .map(|text| self.segmenter.segment(text, &terms))
            .collect()
    }
}
