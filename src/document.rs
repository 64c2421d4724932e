//! 区块文档树模块
//!
//! 解析以注释分隔符标记的区块文档：
//!
//! ```text
//! <!-- wp:paragraph {"align":"center"} -->
//! <p class="has-text-align-center">Hello</p>
//! <!-- /wp:paragraph -->
//! <!-- wp:spacer {"height":"20px"} /-->
//! ```
//!
//! 区块的内部内容是标记片段与子区块交错组成的有序列表。区块之外的自由内容按段落切分为片段。
//! 序列化是逐字节可逆的：未修改的分隔符按原文输出。

// 标准库导入
use std::fmt;
use std::sync::OnceLock;

// 第三方crate导入
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

// 本地模块导入
use crate::error::Result;
use crate::markup::split_paragraphs;
use crate::translation_error;

/// 区块属性（JSON对象，保持键顺序）
pub type Attributes = Map<String, Value>;

/// 文档节点：区块或标记片段
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentNode {
    Block(Block),
    Fragment(Fragment),
}

/// 原始HTML片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    markup: String,
}

/// 带类型名称和属性的区块
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    name: String,
    attributes: Attributes,
    inner: Vec<DocumentNode>,
    opener: String,
    closer: Option<String>,
}

/// 解析后的文档
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    nodes: Vec<DocumentNode>,
}

impl Fragment {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
        }
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }
}

impl Block {
    /// 创建带结束分隔符的区块
    pub fn new(name: &str, attributes: Attributes, inner: Vec<DocumentNode>) -> Self {
        let name = normalize_block_name(name);
        Self {
            opener: render_opener(&name, &attributes, false),
            closer: Some(render_closer(&name)),
            name,
            attributes,
            inner,
        }
    }

    /// 创建自闭合区块（`<!-- wp:name /-->`）
    pub fn void(name: &str, attributes: Attributes) -> Self {
        let name = normalize_block_name(name);
        Self {
            opener: render_opener(&name, &attributes, true),
            closer: None,
            name,
            attributes,
            inner: Vec::new(),
        }
    }

    /// 完整类型名称（如 `core/paragraph`）
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// 读取字符串类型的属性值
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// 设置字符串属性，并重新生成开始分隔符
    pub fn set_attribute(&mut self, key: &str, value: String) {
        self.attributes.insert(key.to_string(), Value::String(value));
        self.opener = render_opener(&self.name, &self.attributes, self.is_void());
    }

    /// 片段与子区块交错组成的内部内容
    pub fn inner(&self) -> &[DocumentNode] {
        &self.inner
    }

    pub fn set_inner(&mut self, inner: Vec<DocumentNode>) {
        self.inner = inner;
    }

    /// 内部HTML（所有片段按顺序拼接）
    pub fn inner_markup(&self) -> String {
        self.inner
            .iter()
            .filter_map(|node| match node {
                DocumentNode::Fragment(fragment) => Some(fragment.markup()),
                DocumentNode::Block(_) => None,
            })
            .collect()
    }

    /// 直接子区块
    pub fn children(&self) -> impl Iterator<Item = &Block> {
        self.inner.iter().filter_map(DocumentNode::as_block)
    }

    pub fn is_void(&self) -> bool {
        self.closer.is_none()
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(&self.opener);
        for node in &self.inner {
            node.write_to(out);
        }
        if let Some(closer) = &self.closer {
            out.push_str(closer);
        }
    }
}

impl DocumentNode {
    pub fn as_block(&self) -> Option<&Block> {
        match self {
            DocumentNode::Block(block) => Some(block),
            DocumentNode::Fragment(_) => None,
        }
    }

    pub fn as_fragment(&self) -> Option<&Fragment> {
        match self {
            DocumentNode::Fragment(fragment) => Some(fragment),
            DocumentNode::Block(_) => None,
        }
    }

    /// 区块类型名称，片段没有类型
    pub fn type_name(&self) -> Option<&str> {
        self.as_block().map(Block::name)
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        match self {
            DocumentNode::Block(block) => block.write_to(out),
            DocumentNode::Fragment(fragment) => out.push_str(fragment.markup()),
        }
    }
}

impl Document {
    /// 宽松解析：结构错误时退化为单个片段，不会丢失内容
    pub fn parse(input: &str) -> Self {
        match Self::try_parse(input) {
            Ok(document) => document,
            Err(e) => {
                warn!("⚠️  {}，整体作为单个片段处理", e);
                Self::single_fragment(input)
            }
        }
    }

    /// 严格解析区块结构
    pub fn try_parse(input: &str) -> Result<Self> {
        let mut root: Vec<DocumentNode> = Vec::new();
        let mut stack: Vec<OpenBlock> = Vec::new();
        let mut cursor = 0;
        let mut search = 0;

        while let Some(offset) = input[search..].find("<!--") {
            let start = search + offset;
            let Some(close) = input[start + 4..].find("-->") else {
                break;
            };
            let end = start + 4 + close + 3;
            search = end;

            let Some(delimiter) = parse_delimiter(&input[start + 4..end - 3])? else {
                continue;
            };

            push_markup(&mut stack, &mut root, &input[cursor..start]);
            let raw = input[start..end].to_string();
            cursor = end;

            match delimiter.kind {
                DelimiterKind::Void => push_node(
                    &mut stack,
                    &mut root,
                    DocumentNode::Block(Block {
                        name: delimiter.name,
                        attributes: delimiter.attributes,
                        inner: Vec::new(),
                        opener: raw,
                        closer: None,
                    }),
                ),
                DelimiterKind::Opener => stack.push(OpenBlock {
                    name: delimiter.name,
                    attributes: delimiter.attributes,
                    opener: raw,
                    inner: Vec::new(),
                }),
                DelimiterKind::Closer => {
                    let Some(open) = stack.pop() else {
                        return Err(translation_error!(
                            structure,
                            format!("位置 {} 的结束分隔符 {} 没有对应的开始分隔符", start, delimiter.name)
                        ));
                    };
                    if open.name != delimiter.name {
                        return Err(translation_error!(
                            structure,
                            format!(
                                "位置 {} 的结束分隔符 {} 与开始分隔符 {} 不匹配",
                                start, delimiter.name, open.name
                            )
                        ));
                    }
                    push_node(
                        &mut stack,
                        &mut root,
                        DocumentNode::Block(Block {
                            name: open.name,
                            attributes: open.attributes,
                            inner: open.inner,
                            opener: open.opener,
                            closer: Some(raw),
                        }),
                    );
                }
            }
        }

        push_markup(&mut stack, &mut root, &input[cursor..]);

        if let Some(open) = stack.last() {
            return Err(translation_error!(
                structure,
                format!("区块 {} 没有结束分隔符", open.name)
            ));
        }

        Ok(Self { nodes: root })
    }

    /// 把整个输入当作一个片段
    pub fn single_fragment(input: &str) -> Self {
        if input.is_empty() {
            return Self::default();
        }
        Self {
            nodes: vec![DocumentNode::Fragment(Fragment::new(input))],
        }
    }

    pub fn from_nodes(nodes: Vec<DocumentNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[DocumentNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<DocumentNode> {
        self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 是否包含至少一个区块
    pub fn has_blocks(&self) -> bool {
        self.nodes.iter().any(|node| node.as_block().is_some())
    }

    /// 按下标路径查找节点
    pub fn node_at(&self, path: &[usize]) -> Option<&DocumentNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.nodes.get(*first)?;
        for index in rest {
            node = match node {
                DocumentNode::Block(block) => block.inner.get(*index)?,
                DocumentNode::Fragment(_) => return None,
            };
        }
        Some(node)
    }

    pub fn serialize(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for node in &self.nodes {
            node.write_to(&mut out);
        }
        f.write_str(&out)
    }
}

/// 尚未遇到结束分隔符的区块
struct OpenBlock {
    name: String,
    attributes: Attributes,
    opener: String,
    inner: Vec<DocumentNode>,
}

#[derive(Debug, PartialEq, Eq)]
enum DelimiterKind {
    Opener,
    Closer,
    Void,
}

struct Delimiter {
    kind: DelimiterKind,
    name: String,
    attributes: Attributes,
}

fn push_node(stack: &mut [OpenBlock], root: &mut Vec<DocumentNode>, node: DocumentNode) {
    match stack.last_mut() {
        Some(open) => open.inner.push(node),
        None => root.push(node),
    }
}

fn push_markup(stack: &mut [OpenBlock], root: &mut Vec<DocumentNode>, markup: &str) {
    if markup.is_empty() {
        return;
    }
    match stack.last_mut() {
        Some(open) => open
            .inner
            .push(DocumentNode::Fragment(Fragment::new(markup))),
        None => root.extend(
            split_paragraphs(markup)
                .into_iter()
                .map(|piece| DocumentNode::Fragment(Fragment::new(piece))),
        ),
    }
}

/// 解析注释内容；不是区块分隔符时返回 `Ok(None)`
fn parse_delimiter(body: &str) -> Result<Option<Delimiter>> {
    let starts_with_space = body.chars().next().is_some_and(char::is_whitespace);
    let ends_with_space = body.chars().last().is_some_and(char::is_whitespace);
    if !starts_with_space || !ends_with_space {
        return Ok(None);
    }

    let trimmed = body.trim();
    let (is_closer, rest) = match trimmed.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let Some(rest) = rest.strip_prefix("wp:") else {
        return Ok(None);
    };

    let name_end = rest
        .find(|c: char| c.is_whitespace())
        .unwrap_or(rest.len());
    let raw_name = &rest[..name_end];
    if !block_name_regex().is_match(raw_name) {
        return Ok(None);
    }
    let name = normalize_block_name(raw_name);

    let mut remainder = rest[name_end..].trim();
    if is_closer {
        if !remainder.is_empty() {
            return Ok(None);
        }
        return Ok(Some(Delimiter {
            kind: DelimiterKind::Closer,
            name,
            attributes: Attributes::new(),
        }));
    }

    let mut kind = DelimiterKind::Opener;
    if let Some(stripped) = remainder.strip_suffix('/') {
        kind = DelimiterKind::Void;
        remainder = stripped.trim_end();
    }

    let attributes = if remainder.is_empty() {
        Attributes::new()
    } else if remainder.starts_with('{') {
        serde_json::from_str::<Attributes>(remainder).map_err(|e| {
            translation_error!(structure, format!("区块 {} 的属性不是合法的JSON对象: {}", name, e))
        })?
    } else {
        return Ok(None);
    };

    Ok(Some(Delimiter {
        kind,
        name,
        attributes,
    }))
}

fn block_name_regex() -> &'static Regex {
    static BLOCK_NAME: OnceLock<Regex> = OnceLock::new();
    BLOCK_NAME.get_or_init(|| {
        Regex::new(r"^(?:[a-z][a-z0-9_-]*/)?[a-z][a-z0-9_-]*$").expect("区块名称正则表达式无效")
    })
}

/// 没有命名空间的名称归入 `core/`
pub fn normalize_block_name(name: &str) -> String {
    let name = name.trim().to_ascii_lowercase();
    if name.contains('/') {
        name
    } else {
        format!("core/{}", name)
    }
}

fn render_opener(name: &str, attributes: &Attributes, void: bool) -> String {
    let short = name.strip_prefix("core/").unwrap_or(name);
    let mut out = format!("<!-- wp:{} ", short);
    if !attributes.is_empty() {
        out.push_str(&serialize_attributes(attributes));
        out.push(' ');
    }
    out.push_str(if void { "/-->" } else { "-->" });
    out
}

fn render_closer(name: &str) -> String {
    let short = name.strip_prefix("core/").unwrap_or(name);
    format!("<!-- /wp:{} -->", short)
}

/// 序列化属性，转义会破坏注释或HTML的字符
fn serialize_attributes(attributes: &Attributes) -> String {
    Value::Object(attributes.clone())
        .to_string()
        .replace("--", "\\u002d\\u002d")
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const POST: &str = "<!-- wp:heading {\"level\":2} -->\n<h2>Title</h2>\n<!-- /wp:heading -->\n\n<!-- wp:group -->\n<div class=\"wp-block-group\"><!-- wp:paragraph -->\n<p>Inner</p>\n<!-- /wp:paragraph --></div>\n<!-- /wp:group -->\n\n<!-- wp:spacer {\"height\":\"20px\"} /-->";

    #[test]
    fn test_parse_nested_blocks() {
        let document = Document::try_parse(POST).unwrap();
        let blocks: Vec<&Block> = document.nodes().iter().filter_map(DocumentNode::as_block).collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].name(), "core/heading");
        assert_eq!(blocks[0].attributes().get("level"), Some(&json!(2)));
        assert_eq!(blocks[1].children().count(), 1);
        assert_eq!(blocks[1].children().next().unwrap().name(), "core/paragraph");
        assert!(blocks[2].is_void());
        assert_eq!(
            blocks[1].inner_markup(),
            "\n<div class=\"wp-block-group\"></div>\n"
        );
    }

    #[test]
    fn test_serialize_is_byte_identical() {
        let document = Document::try_parse(POST).unwrap();
        assert_eq!(document.serialize(), POST);
    }

    #[test]
    fn test_regular_comments_stay_in_markup() {
        let input = "<!-- wp:paragraph -->\n<p>A<!-- more -->B</p>\n<!-- /wp:paragraph -->";
        let document = Document::try_parse(input).unwrap();
        let block = document.nodes()[0].as_block().unwrap();
        assert_eq!(block.inner_markup(), "\n<p>A<!-- more -->B</p>\n");
        assert_eq!(document.serialize(), input);
    }

    #[test]
    fn test_namespaced_block_names() {
        let input = "<!-- wp:my-plugin/card {\"title\":\"Hi\"} /-->";
        let document = Document::try_parse(input).unwrap();
        assert_eq!(document.nodes()[0].type_name(), Some("my-plugin/card"));
    }

    #[test]
    fn test_unbalanced_delimiters_fail_strict_parse() {
        assert!(Document::try_parse("<!-- /wp:paragraph -->").is_err());
        assert!(Document::try_parse("<!-- wp:paragraph --><p>x</p>").is_err());
        assert!(Document::try_parse("<!-- wp:quote --><!-- /wp:paragraph -->").is_err());
        assert!(Document::try_parse("<!-- wp:image {broken -->x<!-- /wp:image -->").is_err());
    }

    #[test]
    fn test_lenient_parse_falls_back_to_single_fragment() {
        let input = "<!-- wp:paragraph --><p>never closed</p>";
        let document = Document::parse(input);
        assert_eq!(document.nodes().len(), 1);
        assert!(document.nodes()[0].as_fragment().is_some());
        assert_eq!(document.serialize(), input);
    }

    #[test]
    fn test_classic_content_splits_into_paragraphs() {
        let input = "<p>One</p>\n\n<p>Two</p>";
        let document = Document::try_parse(input).unwrap();
        assert!(!document.has_blocks());
        assert_eq!(document.nodes().len(), 2);
        assert_eq!(document.serialize(), input);
    }

    #[test]
    fn test_set_attribute_rerenders_opener() {
        let input = "<!-- wp:button {\"text\":\"Buy\",\"width\":50} -->\n<div></div>\n<!-- /wp:button -->";
        let document = Document::try_parse(input).unwrap();
        let mut block = document.nodes()[0].as_block().unwrap().clone();
        block.set_attribute("text", "Fish & <Chips> -- now".to_string());
        let serialized = DocumentNode::Block(block).serialize();
        assert_eq!(
            serialized,
            "<!-- wp:button {\"text\":\"Fish \\u0026 \\u003cChips\\u003e \\u002d\\u002d now\",\"width\":50} -->\n<div></div>\n<!-- /wp:button -->"
        );
    }

    #[test]
    fn test_node_at_path() {
        let document = Document::try_parse(POST).unwrap();
        // 0: heading, 1: "\n\n", 2: group
        let inner = document.node_at(&[2, 1]).unwrap();
        assert_eq!(inner.type_name(), Some("core/paragraph"));
        assert!(document.node_at(&[2, 9]).is_none());
    }

    #[test]
    fn test_programmatic_blocks_render_delimiters() {
        let mut attributes = Attributes::new();
        attributes.insert("height".to_string(), json!("10px"));
        let spacer = Block::void("spacer", attributes);
        let paragraph = Block::new(
            "paragraph",
            Attributes::new(),
            vec![DocumentNode::Fragment(Fragment::new("<p>x</p>"))],
        );
        let document = Document::from_nodes(vec![
            DocumentNode::Block(paragraph),
            DocumentNode::Block(spacer),
        ]);
        assert_eq!(
            document.serialize(),
            "<!-- wp:paragraph --><p>x</p><!-- /wp:paragraph --><!-- wp:spacer {\"height\":\"10px\"} /-->"
        );
    }
}
