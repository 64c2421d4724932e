//! 文本片段提取模块
//!
//! 深度优先遍历文档树，收集可翻译的文本节点和属性值，并为每个片段记录定位信息。
//! 提取与回填共用同一套候选位置枚举逻辑，保证两者的遍历顺序完全一致。

// 标准库导入
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

// 第三方crate导入
use regex::Regex;
use serde::Serialize;

// 本地模块导入
use crate::api_constants::{content_policy, pipeline_config};
use crate::classifier::BlockClassifier;
use crate::document::{Block, Document, DocumentNode};
use crate::markup::{
    decode_character_references, split_whitespace_edges, tokenize, ElementTracker, TokenKind,
};

/// 提取策略
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionPolicy {
    classifier: BlockClassifier,
    block_attributes: Vec<String>,
    markup_attributes: Vec<String>,
    min_chars: usize,
}

impl ExtractionPolicy {
    pub fn new(
        classifier: BlockClassifier,
        block_attributes: Vec<String>,
        markup_attributes: Vec<String>,
    ) -> Self {
        Self {
            classifier,
            block_attributes,
            markup_attributes,
            min_chars: pipeline_config::MIN_SEGMENT_CHARS,
        }
    }

    /// 设置片段最短字符数
    pub fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }

    pub fn classifier(&self) -> &BlockClassifier {
        &self.classifier
    }

    pub fn allows_block_attribute(&self, name: &str) -> bool {
        self.block_attributes.iter().any(|allowed| allowed == name)
    }

    pub fn allows_markup_attribute(&self, name: &str) -> bool {
        self.markup_attributes
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(name))
    }

    /// 判断去除首尾空白后的文本是否值得翻译
    pub fn is_translatable_text(&self, text: &str) -> bool {
        text.chars().count() >= self.min_chars
            && !non_text_regex().is_match(text)
            && !shortcode_regex().is_match(text)
    }
}

impl Default for ExtractionPolicy {
    fn default() -> Self {
        Self::new(
            BlockClassifier::default(),
            to_strings(content_policy::BLOCK_ATTRIBUTE_ALLOW_LIST),
            to_strings(content_policy::MARKUP_ATTRIBUTE_ALLOW_LIST),
        )
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// 只包含数字、标点、符号和空白
fn non_text_regex() -> &'static Regex {
    static NON_TEXT: OnceLock<Regex> = OnceLock::new();
    NON_TEXT.get_or_init(|| Regex::new(r"^[\p{N}\p{P}\p{S}\s]+$").expect("非文本正则表达式无效"))
}

/// 单独的短代码，如 `[gallery ids="1,2"]`、`[/caption]`
fn shortcode_regex() -> &'static Regex {
    static SHORTCODE: OnceLock<Regex> = OnceLock::new();
    SHORTCODE.get_or_init(|| {
        Regex::new(r"^\[/?[A-Za-z][\w-]*(?:\s[^\]]*)?/?\]$").expect("短代码正则表达式无效")
    })
}

/// 片段在节点内的位置
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentPosition {
    /// 片段中的第 `ordinal` 个文本节点
    Text { ordinal: usize },
    /// 区块属性
    BlockAttribute { name: String },
    /// 片段中第 `tag` 个开始标签的属性
    MarkupAttribute { tag: usize, name: String },
}

/// 片段定位：节点下标路径 + 节点内位置
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Locator {
    pub path: Vec<usize>,
    pub position: SegmentPosition,
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self
            .path
            .iter()
            .map(|index| index.to_string())
            .collect::<Vec<_>>()
            .join(".");
        match &self.position {
            SegmentPosition::Text { ordinal } => write!(f, "{}#text{}", path, ordinal),
            SegmentPosition::BlockAttribute { name } => write!(f, "{}@{}", path, name),
            SegmentPosition::MarkupAttribute { tag, name } => {
                write!(f, "{}#tag{}@{}", path, tag, name)
            }
        }
    }
}

/// 片段来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginKind {
    TextNode,
    Attribute(String),
}

/// 可翻译文本片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    /// 去除首尾空白并解码字符引用后的文本
    pub text: String,
    pub locator: Locator,
}

impl TextSegment {
    pub fn origin_kind(&self) -> OriginKind {
        match &self.locator.position {
            SegmentPosition::Text { .. } => OriginKind::TextNode,
            SegmentPosition::BlockAttribute { name }
            | SegmentPosition::MarkupAttribute { name, .. } => OriginKind::Attribute(name.clone()),
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// 标记片段中可替换的位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub position: SegmentPosition,
    /// 原始字节区间：文本节点为整段文本，属性为值（不含引号）
    pub span: Range<usize>,
    pub text: String,
    pub slot: Slot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Text,
    Attribute { quote: Option<char> },
}

/// 按文档顺序枚举标记片段中的可翻译位置
pub(crate) fn fragment_candidates(markup: &str, policy: &ExtractionPolicy) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let mut tracker = ElementTracker::default();
    let mut text_ordinal = 0;
    let mut tag_ordinal = 0;

    for token in tokenize(markup) {
        let excluded = tracker.is_inside_any(content_policy::EXCLUDED_ELEMENTS);

        match &token.kind {
            TokenKind::Text => {
                let ordinal = text_ordinal;
                text_ordinal += 1;
                if excluded {
                    continue;
                }
                let parts = split_whitespace_edges(&markup[token.span.clone()]);
                let decoded = decode_character_references(parts.core);
                let text = decoded.trim();
                if policy.is_translatable_text(text) {
                    candidates.push(Candidate {
                        position: SegmentPosition::Text { ordinal },
                        span: token.span.clone(),
                        text: text.to_string(),
                        slot: Slot::Text,
                    });
                }
            }
            TokenKind::StartTag { attributes, .. } => {
                let tag = tag_ordinal;
                tag_ordinal += 1;
                if !excluded {
                    for attribute in attributes {
                        let Some(value) = &attribute.value else {
                            continue;
                        };
                        if !policy.allows_markup_attribute(&attribute.name) {
                            continue;
                        }
                        let decoded = decode_character_references(&markup[value.span.clone()]);
                        let text = decoded.trim();
                        if policy.is_translatable_text(text) {
                            candidates.push(Candidate {
                                position: SegmentPosition::MarkupAttribute {
                                    tag,
                                    name: attribute.name.clone(),
                                },
                                span: value.span.clone(),
                                text: text.to_string(),
                                slot: Slot::Attribute { quote: value.quote },
                            });
                        }
                    }
                }
            }
            _ => {}
        }

        tracker.observe(&token.kind);
    }

    candidates
}

/// 区块属性中可翻译的 (属性名, 文本) 列表，按属性顺序
pub(crate) fn block_attribute_candidates(
    block: &Block,
    policy: &ExtractionPolicy,
) -> Vec<(String, String)> {
    block
        .attributes()
        .iter()
        .filter(|(name, _)| policy.allows_block_attribute(name))
        .filter_map(|(name, value)| {
            let text = value.as_str()?.trim();
            policy
                .is_translatable_text(text)
                .then(|| (name.clone(), text.to_string()))
        })
        .collect()
}

/// 提取整篇文档的可翻译片段
///
/// 结果顺序确定：同一棵树重复提取得到相同的序列。
pub fn extract(document: &Document, policy: &ExtractionPolicy) -> Vec<TextSegment> {
    document
        .nodes()
        .iter()
        .enumerate()
        .flat_map(|(index, node)| extract_node(node, vec![index], policy))
        .collect()
}

fn extract_node(node: &DocumentNode, path: Vec<usize>, policy: &ExtractionPolicy) -> Vec<TextSegment> {
    match node {
        DocumentNode::Fragment(fragment) => fragment_candidates(fragment.markup(), policy)
            .into_iter()
            .map(|candidate| TextSegment {
                text: candidate.text,
                locator: Locator {
                    path: path.clone(),
                    position: candidate.position,
                },
            })
            .collect(),
        DocumentNode::Block(block) => {
            if policy.classifier().is_opaque(Some(block.name())) {
                return Vec::new();
            }

            let mut segments: Vec<TextSegment> = block_attribute_candidates(block, policy)
                .into_iter()
                .map(|(name, text)| TextSegment {
                    text,
                    locator: Locator {
                        path: path.clone(),
                        position: SegmentPosition::BlockAttribute { name },
                    },
                })
                .collect();

            for (index, child) in block.inner().iter().enumerate() {
                let mut child_path = path.clone();
                child_path.push(index);
                segments.extend(extract_node(child, child_path, policy));
            }
            segments
        }
    }
}
