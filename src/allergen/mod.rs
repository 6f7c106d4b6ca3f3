//! 过敏原检测与高亮
//!
//! 对配料文本做过敏原标注，供 UI 区分渲染。
//!
//! ## 处理流程
//! 1. 词条缓存：按 TTL 从外部目录刷新，失败时降级（过期缓存 / 内置词表）
//! 2. 词条集合：拆分、归一化、小写、去重，按长度降序
//! 3. 文本切分：大小写不敏感、整词匹配，输出覆盖原文的片段序列

mod cache;
mod highlighter;
mod segmenter;
mod terms;
mod types;

pub use cache::{
    AllergenCatalog, CachePolicy, TermCatalogCache, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT,
};
pub use highlighter::AllergenHighlighter;
pub use segmenter::{segment, AllergenMatcher, TextSegmenter, DEFAULT_MAX_TEXT_LEN};
pub use terms::{fallback_terms, normalize_term, TermSet, MIN_TERM_CHARS};
pub use types::{AllergenCatalogEntry, Run, TermLookup, TermSource};
