//! 过敏原文本切分
//!
//! 将所有词条编译为一个交替模式，从左到右扫描，输出覆盖原文的片段序列

use anyhow::Result;
use regex::{Regex, RegexBuilder};
use unicode_normalization::UnicodeNormalization;

use crate::allergen::terms::TermSet;
use crate::allergen::types::Run;

/// 默认可处理的最大输入长度（字节），超出则整体作为普通文本返回
pub const DEFAULT_MAX_TEXT_LEN: usize = 64 * 1024;

/// 编译后正则的体积上限
const MATCHER_SIZE_LIMIT: usize = 64 * 1024 * 1024;

/// 编译后的过敏原匹配器
///
/// 交替顺序即词条顺序（长度降序），同一起点优先命中更长的词条
#[derive(Debug, Clone)]
pub struct AllergenMatcher {
    regex: Regex,
}

impl AllergenMatcher {
    /// 编译词条列表
    ///
    /// 每个词条先转义再拼接，词条中的括号、点号等都按字面匹配
    pub fn compile(terms: &[String]) -> Result<Self> {
        if terms.is_empty() {
            anyhow::bail!("词条列表为空");
        }

        let alternatives: Vec<String> = terms.iter().map(|term| term_pattern(term)).collect();
        let pattern = format!("(?:{})", alternatives.join("|"));

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .unicode(true)
            .size_limit(MATCHER_SIZE_LIMIT)
            .build()
            .map_err(|err| anyhow::anyhow!("编译 {} 个词条失败: {}", terms.len(), err))?;

        Ok(Self { regex })
    }

    /// 切分非空文本
    pub fn segment(&self, text: &str) -> Vec<Run> {
        let mut runs = Vec::new();
        let mut last_end = 0;

        for found in self.regex.find_iter(text) {
            if found.start() > last_end {
                runs.push(Run::plain(&text[last_end..found.start()]));
            }
            runs.push(Run::allergen(found.as_str()));
            last_end = found.end();
        }

        if last_end < text.len() {
            runs.push(Run::plain(&text[last_end..]));
        }

        runs
    }
}

/// 单个词条的模式
///
/// 首尾是单词字符时才加 `\b`；以标点开头或结尾的词条由标点自身定界。
/// 词条内部的空格匹配任意连续空白。
/// 词条是 NFC 形式，带重音的字符同时匹配其分解形式（如 `e\u{300}`）。
fn term_pattern(term: &str) -> String {
    let body = term
        .split(' ')
        .map(|piece| piece.chars().map(char_pattern).collect::<String>())
        .collect::<Vec<_>>()
        .join(r"\s+");

    let lead = if term.chars().next().is_some_and(is_word_char) {
        r"\b"
    } else {
        ""
    };
    let trail = if term.chars().last().is_some_and(is_word_char) {
        r"\b"
    } else {
        ""
    };

    format!("{}{}{}", lead, body, trail)
}

/// 单个字符的模式：有规范分解时写成 `(?:合成|分解)`
fn char_pattern(ch: char) -> String {
    let mut buf = [0u8; 4];
    let composed = regex::escape(ch.encode_utf8(&mut buf));
    let decomposed: String = std::iter::once(ch).nfd().collect();

    if decomposed.chars().eq(std::iter::once(ch)) {
        composed
    } else {
        format!("(?:{}|{})", composed, regex::escape(&decomposed))
    }
}

/// 与正则 Unicode `\w` 一致的近似判断（重音字母算单词字符）
fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// 文本切分器
#[derive(Debug, Clone)]
pub struct TextSegmenter {
    max_text_len: usize,
}

impl TextSegmenter {
    pub fn new(max_text_len: usize) -> Self {
        Self { max_text_len }
    }

    /// 切分文本
    ///
    /// 纯函数，不可失败（无法安全匹配时整体返回为普通文本）
    pub fn segment(&self, text: &str, terms: &TermSet) -> Vec<Run> {
        if text.is_empty() {
            return Vec::new();
        }

        if text.len() > self.max_text_len {
            tracing::debug!(
                "输入长度 {} 超过上限 {}，跳过高亮",
                text.len(),
                self.max_text_len
            );
            return vec![Run::plain(text)];
        }

        match terms.matcher() {
            Some(matcher) => matcher.segment(text),
            None => vec![Run::plain(text)],
        }
    }
}

impl Default for TextSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TEXT_LEN)
    }
}

/// 使用默认长度上限切分文本
pub fn segment(text: &str, terms: &TermSet) -> Vec<Run> {
    TextSegmenter::default().segment(text, terms)
}
