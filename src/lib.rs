// 过敏原检测与高亮引擎
//
// 对配料文本标注过敏原片段，供批次记录界面区分渲染。
// 词条来自远程过敏原目录（带 TTL 缓存与降级），切分为纯内存计算。

pub mod allergen;
pub mod catalog_client;
pub mod config;

pub use allergen::{
    AllergenCatalog, AllergenCatalogEntry, AllergenHighlighter, Run, TermCatalogCache, TermLookup,
    TermSet, TermSource, TextSegmenter,
};
pub use catalog_client::HttpAllergenCatalog;
pub use config::{CatalogConfig, HighlightConfig};
