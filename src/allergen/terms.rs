//! 过敏原词条集合
//!
//! 从目录条目提取词条：拆分、去空白、NFC 归一化、小写、去重、过滤过短词条

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use unicode_normalization::UnicodeNormalization;

use crate::allergen::segmenter::AllergenMatcher;
use crate::allergen::types::AllergenCatalogEntry;

/// 词条最少字符数（按 Unicode 标量计）
pub const MIN_TERM_CHARS: usize = 3;

const EMBEDDED_FALLBACK: &str = include_str!("../../fallback_allergens.txt");

lazy_static::lazy_static! {
    /// 内置兜底词表，目录从未拉取成功时使用
    static ref FALLBACK_TERMS: Arc<TermSet> = Arc::new(TermSet::from_embedded(EMBEDDED_FALLBACK));
}

/// 返回内置兜底词表
pub fn fallback_terms() -> Arc<TermSet> {
    Arc::clone(&FALLBACK_TERMS)
}

/// 标准化单个词条
///
/// 返回 None 表示应丢弃（空白或不足 3 个字符）
pub fn normalize_term(raw: &str) -> Option<String> {
    let nfc: String = raw.trim().nfc().collect();
    let lowered = nfc.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() < MIN_TERM_CHARS {
        return None;
    }
    Some(collapsed)
}

/// 去重后的小写词条集合
///
/// 词条按长度降序排列（同长按字典序），编译后的匹配器在同一起点优先命中长词
#[derive(Debug, Default)]
pub struct TermSet {
    terms: Vec<String>,
    matcher: OnceLock<Option<AllergenMatcher>>,
}

impl TermSet {
    /// 空集合
    pub fn empty() -> Self {
        Self::default()
    }

    /// 从目录条目构建
    pub fn from_entries(entries: &[AllergenCatalogEntry]) -> Self {
        Self::from_terms(
            entries
                .iter()
                .flat_map(|entry| entry.term_fields())
                .flat_map(|field| field.split(',')),
        )
    }

    /// 从原始词条构建
    pub fn from_terms<'a, I>(raw_terms: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let unique: HashSet<String> = raw_terms.into_iter().filter_map(normalize_term).collect();

        let mut terms: Vec<String> = unique.into_iter().collect();
        terms.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });

        Self {
            terms,
            matcher: OnceLock::new(),
        }
    }

    /// 解析内置词表：每行逗号分隔，# 开头为注释
    fn from_embedded(content: &str) -> Self {
        Self::from_terms(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .flat_map(|line| line.split(',')),
        )
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// 大小写不敏感的成员判断
    pub fn contains(&self, term: &str) -> bool {
        normalize_term(term)
            .map(|normalized| self.terms.iter().any(|t| *t == normalized))
            .unwrap_or(false)
    }

    /// 按匹配优先级（长度降序）遍历
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    /// 编译后的匹配器，每个集合只编译一次
    ///
    /// 空集合或编译失败时返回 None
    pub(crate) fn matcher(&self) -> Option<&AllergenMatcher> {
        self.matcher
            .get_or_init(|| {
                if self.terms.is_empty() {
                    return None;
                }
                match AllergenMatcher::compile(&self.terms) {
                    Ok(matcher) => Some(matcher),
                    Err(err) => {
                        tracing::warn!("过敏原匹配器编译失败，本词表不做高亮: {}", err);
                        None
                    }
                }
            })
            .as_ref()
    }
}

impl PartialEq for TermSet {
    fn eq(&self, other: &Self) -> bool {
        self.terms == other.terms
    }
}

impl Eq for TermSet {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_term() {
        assert_eq!(normalize_term("  Latte "), Some("latte".to_string()));
        assert_eq!(normalize_term("FRUTTA   a\tguscio"), Some("frutta a guscio".to_string()));
        assert_eq!(normalize_term("uo"), None);
        assert_eq!(normalize_term("   "), None);
        assert_eq!(normalize_term(""), None);
        // 按字符计数而不是字节
        assert_eq!(normalize_term("tè"), None);
        assert_eq!(normalize_term("caffè"), Some("caffè".to_string()));
    }

    #[test]
    fn test_normalize_term_composes_decomposed_accents() {
        let decomposed = "caffe\u{0300}";
        assert_eq!(normalize_term(decomposed), Some("caffè".to_string()));
    }

    #[test]
    fn from_entries_should_merge_official_and_common_fields() {
        let entries = vec![
            AllergenCatalogEntry::new(7, "Latte, uova", "burro"),
            AllergenCatalogEntry::new(1, "Glutine", "farina di frumento, LATTE"),
        ];

        let set = TermSet::from_entries(&entries);
        assert_eq!(set.len(), 5);
        assert!(set.contains("latte"));
        assert!(set.contains("UOVA"));
        assert!(set.contains("Burro"));
        assert!(set.contains("farina di frumento"));
        assert!(!set.contains("farina"));
    }

    #[test]
    fn from_entries_should_tolerate_missing_fields() {
        let entries = vec![AllergenCatalogEntry {
            id: 3,
            name: Some("Sedano".to_string()),
            official_terms: None,
            common_examples: Some("sedano, , ,".to_string()),
        }];

        let set = TermSet::from_entries(&entries);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["sedano"]);
    }

    #[test]
    fn from_terms_should_drop_short_fragments() {
        let set = TermSet::from_terms(["a", "(", "se", "soia", " "]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["soia"]);
    }

    #[test]
    fn terms_should_be_ordered_longest_first() {
        let set = TermSet::from_terms(["noce", "nocciola", "noci", "arachidi"]);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec!["arachidi", "nocciola", "noce", "noci"]
        );
    }

    #[test]
    fn fallback_terms_should_cover_common_allergens() {
        let fallback = fallback_terms();
        assert!(!fallback.is_empty());
        for term in ["latte", "uova", "glutine", "arachidi", "soia", "sesamo"] {
            assert!(fallback.contains(term), "兜底词表缺少 {}", term);
        }
        assert!(fallback.iter().all(|t| t.chars().count() >= MIN_TERM_CHARS));
    }

    #[test]
    fn matcher_should_be_absent_for_empty_set() {
        assert!(TermSet::empty().matcher().is_none());
        assert!(TermSet::from_terms(["latte"]).matcher().is_some());
    }
}
