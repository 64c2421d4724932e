//! 译文回填模块
//!
//! 按提取时的确定顺序重新遍历文档树，把成功的译文写回对应位置。
//! 只替换定位到的文本节点或属性值，其余字节保持不变。

// 标准库导入
use std::collections::HashMap;
use std::ops::Range;

// 第三方crate导入
use tracing::debug;

// 本地模块导入
use crate::document::{Document, DocumentNode, Fragment};
use crate::error::Result;
use crate::extractor::{
    block_attribute_candidates, extract, fragment_candidates, Candidate, ExtractionPolicy,
    Locator, SegmentPosition, Slot,
};
use crate::markup::{
    decode_character_references, escape_attribute, escape_text, split_whitespace_edges,
};
use crate::pipeline::TranslationUnit;
use crate::translation_error;

/// 回填译文，返回新文档
///
/// `units` 必须与 `extract(document)` 的结果逐一对齐，否则返回数量不匹配错误，
/// 调用方继续使用原文档。失败或未完成的单元保留原文。
pub fn merge(
    document: &Document,
    units: &[TranslationUnit],
    policy: &ExtractionPolicy,
) -> Result<Document> {
    let segments = extract(document, policy);
    if segments.len() != units.len() {
        return Err(translation_error!(
            mismatch,
            segments.len(),
            units.len(),
            "译文单元数量与提取片段数量不一致"
        ));
    }

    for (index, (segment, unit)) in segments.iter().zip(units).enumerate() {
        if segment.locator != unit.segment.locator || segment.text != unit.segment.text {
            return Err(translation_error!(
                mismatch,
                segments.len(),
                units.len(),
                format!("第 {} 个单元的位置 {} 与文档不一致", index, unit.segment.locator)
            ));
        }
    }

    let replacements: HashMap<&Locator, &str> = units
        .iter()
        .filter_map(|unit| {
            let translated = unit.translated_text()?;
            (translated != unit.segment.text).then_some((&unit.segment.locator, translated))
        })
        .collect();

    debug!("回填 {} 个译文（共 {} 个片段）", replacements.len(), units.len());

    if replacements.is_empty() {
        return Ok(document.clone());
    }

    let nodes = document
        .nodes()
        .iter()
        .enumerate()
        .map(|(index, node)| rebuild_node(node, vec![index], &replacements, policy))
        .collect();

    Ok(Document::from_nodes(nodes))
}

fn rebuild_node(
    node: &DocumentNode,
    path: Vec<usize>,
    replacements: &HashMap<&Locator, &str>,
    policy: &ExtractionPolicy,
) -> DocumentNode {
    match node {
        DocumentNode::Fragment(fragment) => {
            let markup = fragment.markup();
            let edits: Vec<(Range<usize>, String)> = fragment_candidates(markup, policy)
                .into_iter()
                .filter_map(|candidate| {
                    let locator = Locator {
                        path: path.clone(),
                        position: candidate.position.clone(),
                    };
                    let translated = replacements.get(&locator)?;
                    Some((candidate.span.clone(), render_candidate(markup, &candidate, translated)))
                })
                .collect();

            if edits.is_empty() {
                node.clone()
            } else {
                DocumentNode::Fragment(Fragment::new(splice(markup, edits)))
            }
        }
        DocumentNode::Block(original) => {
            if policy.classifier().is_opaque(Some(original.name())) {
                return node.clone();
            }

            let mut block = original.clone();
            for (name, _) in block_attribute_candidates(original, policy) {
                let locator = Locator {
                    path: path.clone(),
                    position: SegmentPosition::BlockAttribute { name: name.clone() },
                };
                if let Some(translated) = replacements.get(&locator) {
                    let value = original.attribute_str(&name).unwrap_or_default();
                    block.set_attribute(&name, keep_edges(value, translated));
                }
            }

            let inner = original
                .inner()
                .iter()
                .enumerate()
                .map(|(index, child)| {
                    let mut child_path = path.clone();
                    child_path.push(index);
                    rebuild_node(child, child_path, replacements, policy)
                })
                .collect();
            block.set_inner(inner);

            DocumentNode::Block(block)
        }
    }
}

/// 生成替换原始区间的标记
fn render_candidate(markup: &str, candidate: &Candidate, translated: &str) -> String {
    let raw = &markup[candidate.span.clone()];
    match candidate.slot {
        Slot::Text => {
            let parts = split_whitespace_edges(raw);
            let decoded = decode_character_references(parts.core);
            format!(
                "{}{}{}",
                parts.leading,
                escape_text(&keep_edges(&decoded, translated)),
                parts.trailing
            )
        }
        Slot::Attribute { quote: Some(quote) } => {
            let decoded = decode_character_references(raw);
            escape_attribute(&keep_edges(&decoded, translated), Some(quote))
        }
        Slot::Attribute { quote: None } => {
            let decoded = decode_character_references(raw);
            format!(
                "\"{}\"",
                escape_attribute(&keep_edges(&decoded, translated), Some('"'))
            )
        }
    }
}

/// 保留原值首尾的空白，中间替换为译文
fn keep_edges(original: &str, translated: &str) -> String {
    let leading = &original[..original.len() - original.trim_start().len()];
    let trailing = &original[original.trim_end().len().max(leading.len())..];
    format!("{}{}{}", leading, translated.trim(), trailing)
}

/// 按区间替换，区间互不重叠
fn splice(markup: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(span, _)| span.start);
    let mut out = String::with_capacity(markup.len());
    let mut cursor = 0;
    for (span, replacement) in edits {
        out.push_str(&markup[cursor..span.start]);
        out.push_str(&replacement);
        cursor = span.end;
    }
    out.push_str(&markup[cursor..]);
    out
}
