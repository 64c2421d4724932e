//! 标记片段处理模块
//!
//! 将区块内部的HTML片段切分为带字节区间的词法单元（文本、开始标签、结束标签、注释），
//! 供文本提取和按位置回填使用。所有区间都指向原始字符串，未被修改的部分可以原样输出。

// 标准库导入
use std::ops::Range;

// 第三方crate导入
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

// 本地模块导入
use crate::api_constants::content_policy;

/// 词法单元类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// 文本内容（包括原始文本元素的内容）
    Text,
    /// 开始标签
    StartTag {
        /// 小写标签名
        name: String,
        /// 属性列表（保持原始顺序）
        attributes: Vec<MarkupAttribute>,
        /// 是否以 `/>` 结尾
        self_closing: bool,
    },
    /// 结束标签
    EndTag {
        /// 小写标签名
        name: String,
    },
    /// HTML注释
    Comment,
    /// 其他声明（DOCTYPE、处理指令、未闭合的标签等）
    Declaration,
}

/// 带原始字节区间的词法单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupToken {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

/// 标签属性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupAttribute {
    /// 小写属性名
    pub name: String,
    /// 属性值（布尔属性没有值）
    pub value: Option<AttributeValue>,
}

/// 属性值在原始字符串中的位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue {
    /// 不含引号的值区间
    pub span: Range<usize>,
    /// 使用的引号字符，未加引号时为 None
    pub quote: Option<char>,
}

/// 文本两端的空白与中间主体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextParts<'a> {
    pub leading: &'a str,
    pub core: &'a str,
    pub trailing: &'a str,
}

/// 切分HTML片段为词法单元
///
/// 词法分析是宽松的：不构成标签的 `<` 视为文本，未闭合的标签视为声明，
/// 保证所有单元首尾相接地覆盖整个输入。
pub fn tokenize(markup: &str) -> Vec<MarkupToken> {
    let bytes = markup.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'<' {
            pos += 1;
            continue;
        }

        let Some((kind, end)) = lex_tag(markup, pos) else {
            pos += 1;
            continue;
        };

        if text_start < pos {
            tokens.push(MarkupToken {
                kind: TokenKind::Text,
                span: text_start..pos,
            });
        }

        let raw_text_element = match &kind {
            TokenKind::StartTag {
                name,
                self_closing: false,
                ..
            } if content_policy::RAW_TEXT_ELEMENTS.contains(&name.as_str()) => Some(name.clone()),
            _ => None,
        };

        tokens.push(MarkupToken {
            kind,
            span: pos..end,
        });
        pos = end;
        text_start = end;

        // script/style 的内容不解析为标签
        if let Some(name) = raw_text_element {
            let close = find_closing_tag(markup, end, &name).unwrap_or(markup.len());
            if close > end {
                tokens.push(MarkupToken {
                    kind: TokenKind::Text,
                    span: end..close,
                });
            }
            pos = close;
            text_start = close;
        }
    }

    if text_start < bytes.len() {
        tokens.push(MarkupToken {
            kind: TokenKind::Text,
            span: text_start..bytes.len(),
        });
    }

    tokens
}

/// 从 `<` 位置开始识别一个标签或注释，返回类型和结束位置
fn lex_tag(markup: &str, pos: usize) -> Option<(TokenKind, usize)> {
    let rest = &markup[pos..];

    if rest.starts_with("<!--") {
        let end = rest[4..]
            .find("-->")
            .map(|i| pos + 4 + i + 3)
            .unwrap_or(markup.len());
        return Some((TokenKind::Comment, end));
    }

    if rest.starts_with("<!") || rest.starts_with("<?") {
        let end = rest.find('>').map(|i| pos + i + 1).unwrap_or(markup.len());
        return Some((TokenKind::Declaration, end));
    }

    if let Some(after) = rest.strip_prefix("</") {
        let name = tag_name(after);
        if name.is_empty() {
            return None;
        }
        let end = rest.find('>').map(|i| pos + i + 1).unwrap_or(markup.len());
        return Some((TokenKind::EndTag { name }, end));
    }

    let name = tag_name(&rest[1..]);
    if name.is_empty() {
        return None;
    }

    lex_start_tag(markup, pos + 1 + name.len(), name)
}

/// 解析开始标签的属性部分
fn lex_start_tag(markup: &str, mut i: usize, name: String) -> Option<(TokenKind, usize)> {
    let bytes = markup.as_bytes();
    let len = bytes.len();
    let mut attributes = Vec::new();

    loop {
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= len {
            return Some((TokenKind::Declaration, len));
        }

        match bytes[i] {
            b'>' => {
                return Some((
                    TokenKind::StartTag {
                        name,
                        attributes,
                        self_closing: false,
                    },
                    i + 1,
                ));
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                return Some((
                    TokenKind::StartTag {
                        name,
                        attributes,
                        self_closing: true,
                    },
                    i + 2,
                ));
            }
            b'/' | b'=' => {
                i += 1;
            }
            _ => {
                let name_start = i;
                while i < len
                    && !bytes[i].is_ascii_whitespace()
                    && !matches!(bytes[i], b'=' | b'>' | b'/')
                {
                    i += 1;
                }
                let attr_name = markup[name_start..i].to_ascii_lowercase();

                let mut lookahead = i;
                while lookahead < len && bytes[lookahead].is_ascii_whitespace() {
                    lookahead += 1;
                }

                let value = if lookahead < len && bytes[lookahead] == b'=' {
                    i = lookahead + 1;
                    while i < len && bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    if i >= len {
                        return Some((TokenKind::Declaration, len));
                    }
                    if bytes[i] == b'"' || bytes[i] == b'\'' {
                        let quote = bytes[i];
                        let value_start = i + 1;
                        let close = markup[value_start..].find(quote as char)?;
                        let value_end = value_start + close;
                        i = value_end + 1;
                        Some(AttributeValue {
                            span: value_start..value_end,
                            quote: Some(quote as char),
                        })
                    } else {
                        let value_start = i;
                        while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                            i += 1;
                        }
                        Some(AttributeValue {
                            span: value_start..i,
                            quote: None,
                        })
                    }
                } else {
                    None
                };

                attributes.push(MarkupAttribute {
                    name: attr_name,
                    value,
                });
            }
        }
    }
}

/// 读取标签名（首字符必须是ASCII字母）
fn tag_name(input: &str) -> String {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() => {}
        _ => return String::new(),
    }
    let end = input
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '-' || *c == ':' || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    input[..end].to_ascii_lowercase()
}

/// 查找原始文本元素的结束标签位置（不区分大小写）
fn find_closing_tag(markup: &str, from: usize, name: &str) -> Option<usize> {
    let haystack = markup[from..].to_ascii_lowercase();
    let needle = format!("</{}", name);
    haystack.match_indices(&needle).find_map(|(i, _)| {
        let next = haystack.as_bytes().get(i + needle.len());
        match next {
            None => Some(from + i),
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => Some(from + i),
            _ => None,
        }
    })
}

/// 跟踪当前打开的元素，用于判断文本是否位于排除元素之内
#[derive(Debug, Default, Clone)]
pub struct ElementTracker {
    open: Vec<String>,
}

impl ElementTracker {
    /// 处理一个词法单元，更新打开元素栈
    pub fn observe(&mut self, kind: &TokenKind) {
        match kind {
            TokenKind::StartTag {
                name, self_closing, ..
            } => {
                if !*self_closing && !content_policy::VOID_ELEMENTS.contains(&name.as_str()) {
                    self.open.push(name.clone());
                }
            }
            TokenKind::EndTag { name } => {
                if let Some(index) = self.open.iter().rposition(|open| open == name) {
                    self.open.truncate(index);
                }
            }
            _ => {}
        }
    }

    /// 当前是否位于任一给定元素之内
    pub fn is_inside_any(&self, names: &[&str]) -> bool {
        self.open.iter().any(|open| names.contains(&open.as_str()))
    }

    /// 当前嵌套深度
    pub fn depth(&self) -> usize {
        self.open.len()
    }
}

/// 拆分文本两端的HTML空白（空格、制表、换行、换页、回车）
pub fn split_whitespace_edges(raw: &str) -> TextParts<'_> {
    let core_start = raw.len() - raw.trim_start_matches(is_html_space).len();
    let core_end = raw.trim_end_matches(is_html_space).len().max(core_start);
    TextParts {
        leading: &raw[..core_start],
        core: &raw[core_start..core_end],
        trailing: &raw[core_end..],
    }
}

fn is_html_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0C')
}

/// 解码字符引用（`&amp;`、`&nbsp;`、`&#39;` 等）
///
/// 借助 html5ever 的解析器完成解码；文本中的 `<` 先转为 `&lt;`，不会被当作标签解析。
pub fn decode_character_references(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let guarded = raw.replace('<', "&lt;");
    let dom = parse_document(RcDom::default(), Default::default()).one(guarded);
    let mut decoded = String::with_capacity(raw.len());
    collect_text(&dom.document, &mut decoded);
    decoded
}

fn collect_text(node: &Handle, out: &mut String) {
    if let NodeData::Text { ref contents } = node.data {
        out.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        collect_text(child, out);
    }
}

/// 转义文本内容
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 转义属性值，按原属性使用的引号处理
pub fn escape_attribute(value: &str, quote: Option<char>) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            '"' if quote != Some('\'') => escaped.push_str("&quot;"),
            '\'' if quote == Some('\'') => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 在段落边界处切分自由HTML内容
///
/// 只在所有元素都已闭合的空行处切分，切分后的各段首尾相接等于原输入。
pub fn split_paragraphs(markup: &str) -> Vec<&str> {
    if markup.is_empty() {
        return Vec::new();
    }

    let mut cuts = Vec::new();
    let mut tracker = ElementTracker::default();
    for token in tokenize(markup) {
        if token.kind == TokenKind::Text && tracker.depth() == 0 {
            let text = &markup[token.span.clone()];
            cuts.extend(
                blank_line_ends(text)
                    .into_iter()
                    .map(|offset| token.span.start + offset),
            );
        }
        tracker.observe(&token.kind);
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for cut in cuts {
        if cut > start && cut < markup.len() {
            pieces.push(&markup[start..cut]);
            start = cut;
        }
    }
    pieces.push(&markup[start..]);
    pieces
}

/// 返回文本中每个空行（至少两个换行的空白串）结束的位置
fn blank_line_ends(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut ends = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let mut newlines = 0;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            if bytes[i] == b'\n' {
                newlines += 1;
            }
            i += 1;
        }
        if newlines >= 2 {
            ends.push(i);
        }
    }
    ends
}
