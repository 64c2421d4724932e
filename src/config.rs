//! 配置管理模块
//!
//! 提供CLI参数解析、TOML配置文件加载，以及流水线和服务商配置。
//! 所有配置都以显式的值传入流水线和客户端，不依赖全局状态。

// 标准库导入
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// 第三方crate导入
use clap::Parser;
use serde::Deserialize;

// 本地模块导入
use crate::api_constants::{
    content_policy, default_language_name, pipeline_config, prompt_config, provider_config,
};
use crate::classifier::BlockClassifier;
use crate::error::Result;
use crate::extractor::ExtractionPolicy;
use crate::pipeline::TranslationStrategy;
use crate::translation_error;
use crate::translator::ProviderKind;

/// 流水线配置
///
/// 支持Builder模式进行链式配置。
///
/// # Examples
///
/// ```rust
/// use block_translate::config::PipelineConfig;
/// use block_translate::pipeline::TranslationStrategy;
///
/// let config = PipelineConfig::new()
///     .with_chunk_threshold(8_000)
///     .with_strategy(TranslationStrategy::PerChunk)
///     .with_max_concurrent_requests(4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// 内容分块阈值（字符数）
    chunk_threshold: usize,
    /// 逐片段或逐块调用翻译客户端
    strategy: TranslationStrategy,
    /// 同时进行的翻译请求数
    max_concurrent_requests: usize,
    /// 单次请求超时
    request_timeout: Duration,
    /// 可翻译的区块属性
    block_attributes: Vec<String>,
    /// 可翻译的HTML元素属性
    markup_attributes: Vec<String>,
    /// 不透明区块类型
    opaque_blocks: Vec<String>,
    /// 片段最短字符数
    min_segment_chars: usize,
    /// 需要翻译的元数据字段
    meta_fields: Vec<String>,
}

impl PipelineConfig {
    /// 创建默认配置：
    /// - 分块阈值: 15000 字符
    /// - 策略: 逐片段
    /// - 并发请求: 1（顺序执行）
    /// - 请求超时: 60 秒
    pub fn new() -> Self {
        Self {
            chunk_threshold: pipeline_config::DEFAULT_CHUNK_THRESHOLD,
            strategy: TranslationStrategy::default(),
            max_concurrent_requests: pipeline_config::DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_timeout: Duration::from_secs(provider_config::REQUEST_TIMEOUT_SECONDS),
            block_attributes: to_strings(content_policy::BLOCK_ATTRIBUTE_ALLOW_LIST),
            markup_attributes: to_strings(content_policy::MARKUP_ATTRIBUTE_ALLOW_LIST),
            opaque_blocks: to_strings(content_policy::OPAQUE_BLOCKS),
            min_segment_chars: pipeline_config::MIN_SEGMENT_CHARS,
            meta_fields: to_strings(content_policy::META_FIELD_ALLOW_LIST),
        }
    }

    pub fn chunk_threshold(&self) -> usize {
        self.chunk_threshold
    }

    pub fn strategy(&self) -> TranslationStrategy {
        self.strategy
    }

    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn opaque_blocks(&self) -> &[String] {
        &self.opaque_blocks
    }

    pub fn meta_fields(&self) -> &[String] {
        &self.meta_fields
    }

    pub fn with_chunk_threshold(mut self, threshold: usize) -> Self {
        self.chunk_threshold = threshold;
        self
    }

    pub fn with_strategy(mut self, strategy: TranslationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_concurrent_requests(mut self, requests: usize) -> Self {
        self.max_concurrent_requests = requests;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_block_attributes(mut self, attributes: Vec<String>) -> Self {
        self.block_attributes = attributes;
        self
    }

    pub fn with_markup_attributes(mut self, attributes: Vec<String>) -> Self {
        self.markup_attributes = attributes;
        self
    }

    pub fn with_opaque_blocks(mut self, blocks: Vec<String>) -> Self {
        self.opaque_blocks = blocks;
        self
    }

    pub fn with_min_segment_chars(mut self, chars: usize) -> Self {
        self.min_segment_chars = chars;
        self
    }

    /// 设置元数据字段，去除空白和空项
    pub fn with_meta_fields(mut self, fields: Vec<String>) -> Self {
        self.meta_fields = fields
            .into_iter()
            .map(|field| field.trim().to_string())
            .filter(|field| !field.is_empty())
            .collect();
        self
    }

    /// 校验配置，错误在任何翻译调用之前返回
    pub fn validate(&self) -> Result<()> {
        if self.chunk_threshold == 0 {
            return Err(translation_error!(config, "chunk_threshold", "分块阈值必须大于0"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(translation_error!(
                config,
                "max_concurrent_requests",
                "并发请求数必须大于0"
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(translation_error!(config, "request_timeout", "请求超时必须大于0"));
        }
        Ok(())
    }

    /// 根据配置构建提取策略
    pub fn extraction_policy(&self) -> ExtractionPolicy {
        ExtractionPolicy::new(
            BlockClassifier::new(&self.opaque_blocks),
            self.block_attributes.clone(),
            self.markup_attributes.clone(),
        )
        .with_min_chars(self.min_segment_chars)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// 服务商配置
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    kind: ProviderKind,
    api_key: String,
    model: String,
    /// 自定义接口地址（Gemini 为模型根地址）
    endpoint: Option<String>,
    prompt_template: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key: String::new(),
            model: kind.default_model().to_string(),
            endpoint: None,
            prompt_template: prompt_config::DEFAULT_TRANSLATION_PROMPT.to_string(),
            temperature: provider_config::DEFAULT_TEMPERATURE,
            max_tokens: provider_config::DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(provider_config::REQUEST_TIMEOUT_SECONDS),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn prompt_template(&self) -> &str {
        &self.prompt_template
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 切换服务商；模型仍为原服务商默认值时一并切换
    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        if self.model == self.kind.default_model() {
            self.model = kind.default_model().to_string();
        }
        self.kind = kind;
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = api_key.to_string();
        self
    }

    /// 未配置 API key 时从服务商对应的环境变量读取
    pub fn with_api_key_from_env(mut self) -> Self {
        if self.api_key.trim().is_empty() {
            if let Ok(key) = std::env::var(self.kind.key_env()) {
                self.api_key = key;
            }
        }
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_prompt_template(mut self, template: &str) -> Self {
        self.prompt_template = template.to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::new(ProviderKind::default())
    }
}

/// 语言代码到显示名称的映射，仅用于生成翻译指令
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageNames {
    overrides: HashMap<String, String>,
}

impl LanguageNames {
    pub fn with_name(mut self, code: &str, name: &str) -> Self {
        self.overrides
            .insert(code.to_ascii_lowercase(), name.to_string());
        self
    }

    /// 查找显示名称；未知代码返回首字母大写的代码
    pub fn display_name(&self, code: &str) -> String {
        let key = code.trim().to_ascii_lowercase();
        if let Some(name) = self.overrides.get(&key) {
            return name.clone();
        }
        if let Some(name) = default_language_name(&key) {
            return name.to_string();
        }
        let mut chars = key.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// 完整的运行配置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub provider: ProviderSettings,
    pub languages: LanguageNames,
}

impl AppConfig {
    /// 从TOML文件加载，未出现的键使用默认值
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            translation_error!(file_op, path.display(), "读取", e)
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.into_config())
    }
}

/// TOML配置文件结构
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    pipeline: PipelineSection,
    provider: ProviderSection,
    languages: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PipelineSection {
    chunk_threshold: Option<usize>,
    strategy: Option<TranslationStrategy>,
    max_concurrent_requests: Option<usize>,
    request_timeout_secs: Option<u64>,
    block_attributes: Option<Vec<String>>,
    markup_attributes: Option<Vec<String>>,
    opaque_blocks: Option<Vec<String>>,
    min_segment_chars: Option<usize>,
    meta_fields: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderSection {
    kind: Option<ProviderKind>,
    api_key: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    prompt: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

impl ConfigFile {
    fn into_config(self) -> AppConfig {
        let section = self.pipeline;
        let mut pipeline = PipelineConfig::new();
        if let Some(threshold) = section.chunk_threshold {
            pipeline = pipeline.with_chunk_threshold(threshold);
        }
        if let Some(strategy) = section.strategy {
            pipeline = pipeline.with_strategy(strategy);
        }
        if let Some(requests) = section.max_concurrent_requests {
            pipeline = pipeline.with_max_concurrent_requests(requests);
        }
        if let Some(secs) = section.request_timeout_secs {
            pipeline = pipeline.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(attributes) = section.block_attributes {
            pipeline = pipeline.with_block_attributes(attributes);
        }
        if let Some(attributes) = section.markup_attributes {
            pipeline = pipeline.with_markup_attributes(attributes);
        }
        if let Some(blocks) = section.opaque_blocks {
            pipeline = pipeline.with_opaque_blocks(blocks);
        }
        if let Some(chars) = section.min_segment_chars {
            pipeline = pipeline.with_min_segment_chars(chars);
        }
        if let Some(fields) = section.meta_fields {
            pipeline = pipeline.with_meta_fields(fields);
        }

        let section = self.provider;
        let mut provider = ProviderSettings::new(section.kind.unwrap_or_default());
        if let Some(key) = section.api_key {
            provider = provider.with_api_key(&key);
        }
        if let Some(model) = section.model {
            provider = provider.with_model(&model);
        }
        if let Some(endpoint) = section.endpoint {
            provider = provider.with_endpoint(&endpoint);
        }
        if let Some(prompt) = section.prompt {
            provider = provider.with_prompt_template(&prompt);
        }
        if let Some(temperature) = section.temperature {
            provider = provider.with_temperature(temperature);
        }
        if let Some(max_tokens) = section.max_tokens {
            provider = provider.with_max_tokens(max_tokens);
        }
        if let Some(secs) = section.timeout_secs {
            provider = provider.with_timeout(Duration::from_secs(secs));
        }

        let languages = self
            .languages
            .iter()
            .fold(LanguageNames::default(), |names, (code, name)| {
                names.with_name(code, name)
            });

        AppConfig {
            pipeline,
            provider,
            languages,
        }
    }
}

/// CLI参数结构
#[derive(Parser, Debug)]
#[command(author, version, about = "区块文档翻译工具 - 只翻译文本内容，区块结构与代码保持字节不变", long_about = None)]
pub struct Cli {
    /// 输入文件或目录（.json / .html / .htm / .txt）
    #[arg(short, long, value_name = "FILE_OR_DIR")]
    pub input: PathBuf,

    /// 输出路径 (可选，默认为输入文件名+语言代码)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// 目标语言代码 (如: es, fr, de, zh)
    #[arg(short, long, default_value = "es")]
    pub lang: String,

    /// 源语言代码 (可选)
    #[arg(long)]
    pub source_lang: Option<String>,

    /// 翻译服务商
    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// 模型名称
    #[arg(long)]
    pub model: Option<String>,

    /// API key (默认读取服务商对应的环境变量)
    #[arg(long)]
    pub api_key: Option<String>,

    /// 自定义接口地址
    #[arg(long)]
    pub endpoint: Option<String>,

    /// TOML配置文件
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// 翻译策略
    #[arg(long, value_enum)]
    pub strategy: Option<TranslationStrategy>,

    /// 内容分块阈值（字符数）
    #[arg(long)]
    pub chunk_threshold: Option<usize>,

    /// 并发请求数
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// 单次请求超时（秒）
    #[arg(long)]
    pub timeout: Option<u64>,

    /// 输出每个单元的调试轨迹
    #[arg(long)]
    pub trace: bool,

    /// 显示性能统计
    #[arg(long)]
    pub stats: bool,

    /// 只测试服务商连接
    #[arg(long)]
    pub check: bool,

    /// 详细输出模式
    #[arg(short, long)]
    pub verbose: bool,

    /// 静默模式 (仅输出错误)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// 合并配置文件、命令行参数和环境变量
    pub fn resolve_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };

        let mut pipeline = config.pipeline;
        if let Some(strategy) = self.strategy {
            pipeline = pipeline.with_strategy(strategy);
        }
        if let Some(threshold) = self.chunk_threshold {
            pipeline = pipeline.with_chunk_threshold(threshold);
        }
        if let Some(requests) = self.concurrency {
            pipeline = pipeline.with_max_concurrent_requests(requests);
        }
        if let Some(secs) = self.timeout {
            pipeline = pipeline.with_request_timeout(Duration::from_secs(secs));
        }
        config.pipeline = pipeline;

        let mut provider = config.provider;
        if let Some(kind) = self.provider {
            provider = provider.with_kind(kind);
        }
        if let Some(model) = &self.model {
            provider = provider.with_model(model);
        }
        if let Some(key) = &self.api_key {
            provider = provider.with_api_key(key);
        }
        if let Some(endpoint) = &self.endpoint {
            provider = provider.with_endpoint(endpoint);
        }
        if let Some(secs) = self.timeout {
            provider = provider.with_timeout(Duration::from_secs(secs));
        }
        config.provider = provider.with_api_key_from_env();

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_threshold(), 15_000);
        assert_eq!(config.max_concurrent_requests(), 1);
        assert_eq!(config.strategy(), TranslationStrategy::PerSegment);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let err = PipelineConfig::new()
            .with_chunk_threshold(0)
            .validate()
            .unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
        assert!(PipelineConfig::new()
            .with_max_concurrent_requests(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_extraction_policy_uses_opaque_blocks() {
        let policy = PipelineConfig::new()
            .with_opaque_blocks(vec!["core/table".to_string()])
            .extraction_policy();
        assert!(policy.classifier().is_opaque(Some("core/table")));
        assert!(!policy.classifier().is_opaque(Some("core/code")));
    }

    #[test]
    fn test_language_names() {
        let names = LanguageNames::default().with_name("ES", "Castellano");
        assert_eq!(names.display_name("es"), "Castellano");
        assert_eq!(names.display_name("fr"), "French");
        assert_eq!(names.display_name("eu"), "Eu");
    }

    #[test]
    fn test_provider_kind_switch_updates_default_model() {
        let settings = ProviderSettings::new(ProviderKind::OpenAi).with_kind(ProviderKind::Claude);
        assert_eq!(settings.model(), "claude-3-5-sonnet-20241022");

        let custom = ProviderSettings::new(ProviderKind::OpenAi)
            .with_model("gpt-4o")
            .with_kind(ProviderKind::Gemini);
        assert_eq!(custom.model(), "gpt-4o");
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [pipeline]
            chunk_threshold = 5000
            strategy = "chunk"
            opaque_blocks = ["core/code", "acme/*"]
            meta_fields = ["seo_title", " ", "subtitle "]

            [provider]
            kind = "gemini"
            api_key = "abc"

            [languages]
            gl = "Galician"
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.chunk_threshold(), 5000);
        assert_eq!(config.pipeline.strategy(), TranslationStrategy::PerChunk);
        assert_eq!(config.pipeline.max_concurrent_requests(), 1);
        assert_eq!(config.pipeline.meta_fields(), ["seo_title", "subtitle"]);
        assert_eq!(config.provider.kind(), ProviderKind::Gemini);
        assert_eq!(config.provider.model(), "gemini-2.5-flash");
        assert_eq!(config.provider.api_key(), "abc");
        assert_eq!(config.languages.display_name("gl"), "Galician");
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let err = AppConfig::from_toml_str("[pipeline]\nchunk_threshold = \"big\"").unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[provider]\nkind = \"claude\"\nmodel = \"claude-3-haiku\"").unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.provider.kind(), ProviderKind::Claude);
        assert_eq!(config.provider.model(), "claude-3-haiku");

        let missing = AppConfig::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert_eq!(missing.kind(), "FileOperationError");
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "block-translate",
            "--input",
            "post.json",
            "--lang",
            "fr",
            "--provider",
            "claude",
            "--api-key",
            "k",
            "--strategy",
            "chunk",
            "--concurrency",
            "3",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.provider.kind(), ProviderKind::Claude);
        assert_eq!(config.provider.api_key(), "k");
        assert_eq!(config.pipeline.strategy(), TranslationStrategy::PerChunk);
        assert_eq!(config.pipeline.max_concurrent_requests(), 3);
    }
}
