/// 翻译服务与流水线配置常量
///
/// 该文件定义了所有翻译服务相关的常量配置，方便统一管理和维护

/// AI服务商配置
pub mod provider_config {
    /// OpenAI 聊天补全接口
    pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

    /// Anthropic 消息接口
    pub const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";

    /// Gemini 接口根地址（模型名拼接在路径中）
    pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models/";

    /// Anthropic API 版本头
    pub const ANTHROPIC_VERSION: &str = "2023-06-01";

    /// 默认模型
    pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-sonnet-20241022";
    pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

    /// 采样温度
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;

    /// Claude 单次响应的最大token数
    pub const DEFAULT_MAX_TOKENS: u32 = 8000;

    /// 请求超时时间（秒）
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 60;

    /// API key 环境变量
    pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
    pub const CLAUDE_KEY_ENV: &str = "ANTHROPIC_API_KEY";
    pub const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";
}

/// 流水线配置
pub mod pipeline_config {
    /// 内容分块阈值（字符数）
    pub const DEFAULT_CHUNK_THRESHOLD: usize = 15_000;

    /// 片段最短字符数（去除首尾空白后）
    pub const MIN_SEGMENT_CHARS: usize = 2;

    /// 默认并发请求数（顺序执行）
    pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 1;

    /// 调试轨迹中原文/译文的预览长度
    pub const TRACE_PREVIEW_CHARS: usize = 60;
}

/// 内容策略
pub mod content_policy {
    /// 默认不可翻译的区块类型
    pub const OPAQUE_BLOCKS: &[&str] = &[
        "core/code",
        "core/preformatted",
        "core/html",
        "core/shortcode",
        "core/embed",
        "core-embed/*",
        "core/separator",
        "core/spacer",
    ];

    /// 允许翻译的区块属性
    pub const BLOCK_ATTRIBUTE_ALLOW_LIST: &[&str] = &[
        "content",
        "text",
        "title",
        "caption",
        "citation",
        "value",
        "placeholder",
        "label",
        "alt",
    ];

    /// 默认翻译的元数据字段（SEO 标题、描述和摘要）
    pub const META_FIELD_ALLOW_LIST: &[&str] =
        &["_yoast_wpseo_title", "_yoast_wpseo_metadesc", "_excerpt"];

    /// 允许翻译的HTML元素属性
    pub const MARKUP_ATTRIBUTE_ALLOW_LIST: &[&str] = &["alt", "title", "placeholder", "aria-label"];

    /// 内部文本不翻译的HTML元素
    pub const EXCLUDED_ELEMENTS: &[&str] = &["script", "style", "code", "noscript", "textarea"];

    /// 原始文本元素（内容不解析为标签）
    pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

    /// 空元素（没有结束标签）
    pub const VOID_ELEMENTS: &[&str] = &[
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
        "track", "wbr",
    ];
}

/// 提示词配置
pub mod prompt_config {
    /// 默认翻译提示词，`{target_language}` 会被替换为语言名称
    pub const DEFAULT_TRANSLATION_PROMPT: &str = "Translate the following text to {target_language}. Maintain all HTML tags, formatting, and structure. Only translate the visible text content, not HTML attributes or code.";

    /// 批量翻译时附加的索引标记说明
    pub const INDEXED_BATCH_HINT: &str = "Each item starts with a marker like [0]. Keep every marker exactly as it is, translate only the text after it, and return one item per marker in the same order.";
}

/// 语言代码到显示名称的默认映射
pub const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("es", "Spanish"),
    ("en", "English"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("pt-br", "Brazilian Portuguese"),
    ("nl", "Dutch"),
    ("ru", "Russian"),
    ("ja", "Japanese"),
    ("zh", "Chinese"),
    ("ko", "Korean"),
    ("ar", "Arabic"),
    ("pl", "Polish"),
    ("tr", "Turkish"),
    ("sv", "Swedish"),
    ("da", "Danish"),
    ("no", "Norwegian"),
    ("fi", "Finnish"),
    ("el", "Greek"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("th", "Thai"),
    ("vi", "Vietnamese"),
    ("id", "Indonesian"),
    ("cs", "Czech"),
    ("ro", "Romanian"),
    ("hu", "Hungarian"),
    ("uk", "Ukrainian"),
];

/// 查找默认语言名称
pub fn default_language_name(code: &str) -> Option<&'static str> {
    let code = code.to_ascii_lowercase();
    LANGUAGE_NAMES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_lookup() {
        assert_eq!(default_language_name("es"), Some("Spanish"));
        assert_eq!(default_language_name("PT-BR"), Some("Brazilian Portuguese"));
        assert_eq!(default_language_name("xx"), None);
    }

    #[test]
    fn test_policy_lists() {
        assert!(content_policy::OPAQUE_BLOCKS.contains(&"core/code"));
        assert!(content_policy::BLOCK_ATTRIBUTE_ALLOW_LIST.contains(&"alt"));
        assert!(content_policy::EXCLUDED_ELEMENTS.contains(&"script"));
    }
}
