//! 翻译客户端模块
//!
//! 定义流水线使用的翻译客户端接口，以及基于服务商策略（OpenAI / Claude / Gemini）的实现。
//! 批量翻译采用索引标记模式：每个文本前加 `[n]`，返回结果按标记拆分回原位置。

// 标准库导入
use std::fmt;
use std::sync::{Arc, OnceLock};

// 第三方crate导入
use async_trait::async_trait;
use clap::ValueEnum;
use regex::Regex;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

// 本地模块导入
use crate::api_constants::{prompt_config, provider_config};
use crate::config::{LanguageNames, ProviderSettings};
use crate::error::Result;
use crate::translation_error;

/// 翻译客户端接口
///
/// 流水线把客户端视为无副作用的请求/响应函数；重试、缓存等由实现自行决定。
#[async_trait]
pub trait TranslationClient: Send + Sync {
    /// 客户端名称，用于日志和错误信息
    fn name(&self) -> &str;

    /// 翻译单个文本
    async fn translate(&self, text: &str, target: &str, source: Option<&str>) -> Result<String>;

    /// 在一次调用中翻译多个文本
    ///
    /// 返回值与输入一一对应；响应中缺失的项为 `None`。
    async fn translate_batch(
        &self,
        texts: &[String],
        target: &str,
        source: Option<&str>,
    ) -> Result<Vec<Option<String>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .translate(&encode_indexed_batch(texts), target, source)
            .await?;
        Ok(decode_indexed_batch(&response, texts.len()))
    }

    /// 检查凭据等前置条件，在任何翻译调用之前执行
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: TranslationClient + ?Sized> TranslationClient for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn translate(&self, text: &str, target: &str, source: Option<&str>) -> Result<String> {
        (**self).translate(text, target, source).await
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        target: &str,
        source: Option<&str>,
    ) -> Result<Vec<Option<String>>> {
        (**self).translate_batch(texts, target, source).await
    }

    async fn ensure_ready(&self) -> Result<()> {
        (**self).ensure_ready().await
    }
}

/// 把多个文本编码为带索引标记的单个请求文本
pub fn encode_indexed_batch(texts: &[String]) -> String {
    texts
        .iter()
        .enumerate()
        .map(|(index, text)| format!("[{}] {}", index, text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 按索引标记拆分批量翻译结果
///
/// 标记之间的内容（可以跨多行）属于前一个标记；越界、重复或缺失的标记被忽略。
pub fn decode_indexed_batch(response: &str, expected: usize) -> Vec<Option<String>> {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    let marker = MARKER.get_or_init(|| Regex::new(r"(?m)^[ \t]*\[(\d+)\][ \t]?").expect("索引标记正则表达式无效"));

    let mut results = vec![None; expected];
    let markers: Vec<(usize, usize, Option<usize>)> = marker
        .captures_iter(response)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let index = captures.get(1)?.as_str().parse::<usize>().ok();
            Some((whole.start(), whole.end(), index))
        })
        .collect();

    for (position, (_, content_start, index)) in markers.iter().enumerate() {
        let content_end = markers
            .get(position + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(response.len());
        let Some(index) = *index else {
            continue;
        };
        let content = response[*content_start..content_end].trim();
        if index < expected && results[index].is_none() && !content.is_empty() {
            results[index] = Some(content.to_string());
        }
    }

    results
}

/// 翻译服务商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    #[value(name = "openai")]
    #[serde(rename = "openai")]
    OpenAi,
    Claude,
    Gemini,
}

impl ProviderKind {
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => provider_config::DEFAULT_OPENAI_MODEL,
            ProviderKind::Claude => provider_config::DEFAULT_CLAUDE_MODEL,
            ProviderKind::Gemini => provider_config::DEFAULT_GEMINI_MODEL,
        }
    }

    /// 读取 API key 的环境变量名
    pub fn key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => provider_config::OPENAI_KEY_ENV,
            ProviderKind::Claude => provider_config::CLAUDE_KEY_ENV,
            ProviderKind::Gemini => provider_config::GEMINI_KEY_ENV,
        }
    }

    /// 默认接口地址（Gemini 为模型路径的根地址）
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => provider_config::OPENAI_API_URL,
            ProviderKind::Claude => provider_config::CLAUDE_API_URL,
            ProviderKind::Gemini => provider_config::GEMINI_API_BASE,
        }
    }

    fn response_text_pointer(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "/choices/0/message/content",
            ProviderKind::Claude => "/content/0/text",
            ProviderKind::Gemini => "/candidates/0/content/parts/0/text",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Claude => "claude",
            ProviderKind::Gemini => "gemini",
        };
        f.write_str(name)
    }
}

/// 基于服务商策略的翻译客户端
///
/// 服务商在构造时通过 [`ProviderSettings`] 显式指定。
#[derive(Debug, Clone)]
pub struct ProviderClient {
    settings: ProviderSettings,
    languages: LanguageNames,
    name: String,
    http: Client,
}

impl ProviderClient {
    /// 创建客户端，校验自定义接口地址
    pub fn new(settings: ProviderSettings, languages: LanguageNames) -> Result<Self> {
        if let Some(endpoint) = settings.endpoint() {
            Url::parse(endpoint).map_err(|e| {
                translation_error!(config, "endpoint", format!("无效的接口地址 {}: {}", endpoint, e))
            })?;
        }

        let http = Client::builder().timeout(settings.timeout()).build()?;

        Ok(Self {
            name: settings.kind().to_string(),
            settings,
            languages,
            http,
        })
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// 生成发送给模型的翻译指令
    pub fn build_instruction(&self, target: &str, source: Option<&str>) -> String {
        let target_name = self.languages.display_name(target);
        let mut instruction = self
            .settings
            .prompt_template()
            .replace("{target_language}", &target_name);

        if let Some(source) = source.filter(|source| !source.trim().is_empty()) {
            let source_name = self.languages.display_name(source);
            if instruction.contains("{source_language}") {
                instruction = instruction.replace("{source_language}", &source_name);
            } else {
                instruction.push_str(&format!(" The source text is in {}.", source_name));
            }
        }

        instruction
    }

    /// 连接测试：把 "Hello" 翻译为西班牙语
    pub async fn test_connection(&self) -> Result<String> {
        self.ensure_ready().await?;
        let translated = self.translate("Hello", "es", None).await?;
        info!("✅ {} 连接正常: Hello → {}", self.name, translated);
        Ok(translated)
    }

    fn endpoint(&self) -> &str {
        self.settings
            .endpoint()
            .unwrap_or_else(|| self.settings.kind().default_endpoint())
    }

    /// Gemini 的模型名在路径中，key 通过 `x-goog-api-key` 请求头发送
    pub fn gemini_url(&self) -> Result<Url> {
        let base = self.endpoint().trim_end_matches('/');
        Url::parse(&format!(
            "{}/{}:generateContent",
            base,
            self.settings.model()
        ))
        .map_err(|e| translation_error!(config, "endpoint", e))
    }

    fn build_request(&self, instruction: &str, text: &str) -> Result<RequestBuilder> {
        let settings = &self.settings;
        let request = match settings.kind() {
            ProviderKind::OpenAi => self
                .http
                .post(self.endpoint())
                .bearer_auth(settings.api_key())
                .json(&json!({
                    "model": settings.model(),
                    "messages": [
                        { "role": "system", "content": instruction },
                        { "role": "user", "content": text }
                    ],
                    "temperature": settings.temperature(),
                })),
            ProviderKind::Claude => self
                .http
                .post(self.endpoint())
                .header("x-api-key", settings.api_key())
                .header("anthropic-version", provider_config::ANTHROPIC_VERSION)
                .json(&json!({
                    "model": settings.model(),
                    "max_tokens": settings.max_tokens(),
                    "system": instruction,
                    "messages": [
                        { "role": "user", "content": text }
                    ],
                })),
            ProviderKind::Gemini => self
                .http
                .post(self.gemini_url()?)
                .header("x-goog-api-key", settings.api_key())
                .json(&json!({
                    "contents": [
                        { "parts": [ { "text": format!("{}\n\n{}", instruction, text) } ] }
                    ],
                    "generationConfig": {
                        "temperature": settings.temperature(),
                        "maxOutputTokens": settings.max_tokens(),
                    },
                })),
        };
        Ok(request)
    }

    async fn send(&self, instruction: &str, text: &str) -> Result<String> {
        let response = self.build_request(instruction, text)?.send().await?;
        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            translation_error!(
                provider,
                self.name,
                format!("响应不是合法的JSON: {}", e.without_url()),
                status.as_u16()
            )
        })?;

        debug!("{} 响应状态: {}", self.name, status);
        extract_response_text(self.settings.kind(), &body, status.as_u16())
    }
}

/// 从服务商响应中取出译文
pub fn extract_response_text(kind: ProviderKind, body: &Value, status: u16) -> Result<String> {
    if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
        return Err(translation_error!(provider, kind, message, status));
    }
    if !(200..300).contains(&status) {
        return Err(translation_error!(provider, kind, format!("HTTP {}", status), status));
    }

    body.pointer(kind.response_text_pointer())
        .and_then(Value::as_str)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| translation_error!(provider, kind, "响应格式无效，缺少译文字段", status))
}

#[async_trait]
impl TranslationClient for ProviderClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(&self, text: &str, target: &str, source: Option<&str>) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let instruction = self.build_instruction(target, source);
        self.send(&instruction, text).await
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        target: &str,
        source: Option<&str>,
    ) -> Result<Vec<Option<String>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let instruction = format!(
            "{} {}",
            self.build_instruction(target, source),
            prompt_config::INDEXED_BATCH_HINT
        );
        let response = self.send(&instruction, &encode_indexed_batch(texts)).await?;
        Ok(decode_indexed_batch(&response, texts.len()))
    }

    async fn ensure_ready(&self) -> Result<()> {
        if self.settings.api_key().trim().is_empty() {
            return Err(translation_error!(
                config,
                "api_key",
                format!(
                    "{} 的 API key 未配置（可使用 --api-key 或环境变量 {}）",
                    self.name,
                    self.settings.kind().key_env()
                )
            ));
        }
        if self.settings.model().trim().is_empty() {
            return Err(translation_error!(config, "model", "模型名称不能为空"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranslationError;

    fn client(kind: ProviderKind) -> ProviderClient {
        ProviderClient::new(
            ProviderSettings::new(kind).with_api_key("secret"),
            LanguageNames::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_indexed_batch_encoding() {
        let texts = vec!["Hello".to_string(), "  World ".to_string()];
        assert_eq!(encode_indexed_batch(&texts), "[0] Hello\n[1] World");
    }

    #[test]
    fn test_indexed_batch_decoding() {
        let decoded = decode_indexed_batch("[0] Hola\n[2] Adiós\namigo\n[7] extra", 3);
        assert_eq!(
            decoded,
            vec![Some("Hola".to_string()), None, Some("Adiós\namigo".to_string())]
        );
    }

    #[test]
    fn test_indexed_batch_decoding_without_markers() {
        assert_eq!(decode_indexed_batch("Hola", 2), vec![None, None]);
    }

    #[test]
    fn test_build_instruction_uses_language_names() {
        let client = client(ProviderKind::OpenAi);
        let instruction = client.build_instruction("fr", None);
        assert!(instruction.starts_with("Translate the following text to French."));

        let with_source = client.build_instruction("xx", Some("de"));
        assert!(with_source.contains("to Xx."));
        assert!(with_source.ends_with("The source text is in German."));
    }

    #[test]
    fn test_build_instruction_source_placeholder() {
        let settings = ProviderSettings::new(ProviderKind::Claude)
            .with_api_key("k")
            .with_prompt_template("From {source_language} to {target_language}:");
        let client = ProviderClient::new(settings, LanguageNames::default()).unwrap();
        assert_eq!(
            client.build_instruction("es", Some("en")),
            "From English to Spanish:"
        );
    }

    #[test]
    fn test_gemini_url() {
        let client = client(ProviderKind::Gemini);
        let url = client.gemini_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_gemini_key_sent_as_header() {
        let client = client(ProviderKind::Gemini);
        let request = client.build_request("Translate", "Hello").unwrap().build().unwrap();
        assert!(request.url().query().is_none());
        assert!(!request.url().as_str().contains("secret"));
        assert_eq!(
            request.headers().get("x-goog-api-key").unwrap(),
            "secret"
        );
    }

    #[test]
    fn test_invalid_endpoint_is_configuration_error() {
        let settings = ProviderSettings::new(ProviderKind::OpenAi).with_endpoint("not a url");
        let err = ProviderClient::new(settings, LanguageNames::default()).unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn test_extract_response_text() {
        let openai = json!({ "choices": [ { "message": { "content": " Hola " } } ] });
        assert_eq!(
            extract_response_text(ProviderKind::OpenAi, &openai, 200).unwrap(),
            "Hola"
        );

        let claude = json!({ "content": [ { "type": "text", "text": "Bonjour" } ] });
        assert_eq!(
            extract_response_text(ProviderKind::Claude, &claude, 200).unwrap(),
            "Bonjour"
        );

        let gemini = json!({ "candidates": [ { "content": { "parts": [ { "text": "Hallo" } ] } } ] });
        assert_eq!(
            extract_response_text(ProviderKind::Gemini, &gemini, 200).unwrap(),
            "Hallo"
        );
    }

    #[test]
    fn test_extract_response_errors() {
        let error = json!({ "error": { "message": "invalid api key" } });
        match extract_response_text(ProviderKind::OpenAi, &error, 401) {
            Err(TranslationError::Provider {
                message,
                status_code,
                ..
            }) => {
                assert_eq!(message, "invalid api key");
                assert_eq!(status_code, Some(401));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let malformed = json!({ "choices": [] });
        assert!(extract_response_text(ProviderKind::OpenAi, &malformed, 200).is_err());
    }

    #[tokio::test]
    async fn test_ensure_ready_requires_api_key() {
        let client = ProviderClient::new(
            ProviderSettings::new(ProviderKind::Claude),
            LanguageNames::default(),
        )
        .unwrap();
        let err = client.ensure_ready().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_empty_text_skips_request() {
        let client = client(ProviderKind::OpenAi);
        assert_eq!(client.translate("   ", "es", None).await.unwrap(), "");
    }
}
