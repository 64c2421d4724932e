//! 区块分类模块
//!
//! 根据跳过集合判断区块类型是否为不可翻译（不透明）区块

// 标准库导入
use std::collections::HashSet;

// 本地模块导入
use crate::api_constants::content_policy;
use crate::document::normalize_block_name;

/// 区块分类器
///
/// 跳过集合中的条目可以是完整类型名（`core/code`），也可以是命名空间通配（`core-embed/*`）。
/// 没有命名空间的条目按 `core/` 处理。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockClassifier {
    exact: HashSet<String>,
    namespaces: HashSet<String>,
}

impl BlockClassifier {
    /// 使用给定跳过集合创建分类器
    pub fn new<I, S>(opaque_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exact = HashSet::new();
        let mut namespaces = HashSet::new();

        for entry in opaque_types {
            let entry = entry.as_ref().trim().to_ascii_lowercase();
            if entry.is_empty() {
                continue;
            }
            match entry.strip_suffix("/*") {
                Some(namespace) => {
                    namespaces.insert(namespace.to_string());
                }
                None => {
                    exact.insert(normalize_block_name(&entry));
                }
            }
        }

        Self { exact, namespaces }
    }

    /// 判断区块类型是否不可翻译
    ///
    /// 对任何输入都返回结果；未知类型和自由内容（无类型）视为可翻译。
    pub fn is_opaque(&self, type_name: Option<&str>) -> bool {
        let Some(type_name) = type_name else {
            return false;
        };
        if type_name.trim().is_empty() {
            return false;
        }

        let name = normalize_block_name(type_name);
        if self.exact.contains(&name) {
            return true;
        }

        name.split_once('/')
            .is_some_and(|(namespace, _)| self.namespaces.contains(namespace))
    }
}

impl Default for BlockClassifier {
    fn default() -> Self {
        Self::new(content_policy::OPAQUE_BLOCKS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_skip_set() {
        let classifier = BlockClassifier::default();
        for name in [
            "core/code",
            "core/preformatted",
            "core/html",
            "core/shortcode",
            "core/embed",
            "core/separator",
            "core/spacer",
        ] {
            assert!(classifier.is_opaque(Some(name)), "{} 应为不透明区块", name);
        }
    }

    #[test]
    fn test_unknown_and_freeform_are_translatable() {
        let classifier = BlockClassifier::default();
        assert!(!classifier.is_opaque(Some("core/paragraph")));
        assert!(!classifier.is_opaque(Some("acme/unknown-widget")));
        assert!(!classifier.is_opaque(None));
        assert!(!classifier.is_opaque(Some("")));
    }

    #[test]
    fn test_short_names_and_case() {
        let classifier = BlockClassifier::default();
        assert!(classifier.is_opaque(Some("code")));
        assert!(classifier.is_opaque(Some("Core/Code")));
    }

    #[test]
    fn test_namespace_wildcard() {
        let classifier = BlockClassifier::default();
        assert!(classifier.is_opaque(Some("core-embed/youtube")));

        let custom = BlockClassifier::new(["acme/*", "table"]);
        assert!(custom.is_opaque(Some("acme/chart")));
        assert!(custom.is_opaque(Some("core/table")));
        assert!(!custom.is_opaque(Some("core/code")));
    }
}
