//! 翻译流水线模块
//!
//! 按 标题 → 内容 → 摘要 的顺序翻译单篇文档，管理每个翻译单元的生命周期，
//! 并汇总失败数量和调试轨迹。也提供可取消的批量文档翻译。

// 标准库导入
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// 第三方crate导入
use chrono::{DateTime, Local};
use clap::ValueEnum;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

// 本地模块导入
use crate::chunker::{chunk, ChunkUnit};
use crate::config::PipelineConfig;
use crate::document::Document;
use crate::error::{Result, TranslationError};
use crate::extractor::{extract, ExtractionPolicy, TextSegment};
use crate::merger::merge;
use crate::translation_error;
use crate::translator::TranslationClient;
use crate::utils::truncate_for_trace;

/// 调用翻译客户端的粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
pub enum TranslationStrategy {
    /// 每个片段一次调用，互不影响
    #[default]
    #[value(name = "segment")]
    #[serde(rename = "segment", alias = "per_segment")]
    PerSegment,
    /// 按分块阈值把片段分组，每组一次批量调用
    #[value(name = "chunk")]
    #[serde(rename = "chunk", alias = "per_chunk")]
    PerChunk,
}

/// 翻译单元状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    Pending,
    Succeeded { translated_text: String },
    Failed { error: String },
}

/// 翻译单元：一个片段及其翻译结果
///
/// 创建时为 `Pending`，之后只能转换一次到 `Succeeded` 或 `Failed`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    pub segment: TextSegment,
    status: UnitStatus,
}

impl TranslationUnit {
    pub fn new(segment: TextSegment) -> Self {
        Self {
            segment,
            status: UnitStatus::Pending,
        }
    }

    pub fn status(&self) -> &UnitStatus {
        &self.status
    }

    /// 标记成功；已处于终态时返回 `false` 且不做修改
    pub fn succeed(&mut self, translated_text: String) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = UnitStatus::Succeeded { translated_text };
        true
    }

    /// 标记失败；已处于终态时返回 `false` 且不做修改
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = UnitStatus::Failed {
            error: error.into(),
        };
        true
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, UnitStatus::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, UnitStatus::Failed { .. })
    }

    pub fn translated_text(&self) -> Option<&str> {
        match &self.status {
            UnitStatus::Succeeded { translated_text } => Some(translated_text),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            UnitStatus::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// 调试轨迹中的一行
    pub fn trace_line(&self) -> String {
        let before = truncate_for_trace(&self.segment.text);
        match &self.status {
            UnitStatus::Succeeded { translated_text } => format!(
                "✓ [{}] \"{}\" → \"{}\"",
                self.segment.locator,
                before,
                truncate_for_trace(translated_text)
            ),
            UnitStatus::Failed { error } => {
                format!("✗ [{}] \"{}\": {}", self.segment.locator, before, error)
            }
            UnitStatus::Pending => format!("… [{}] \"{}\"", self.segment.locator, before),
        }
    }
}

impl ChunkUnit for TranslationUnit {
    fn size(&self) -> usize {
        self.segment.size()
    }
}

/// 文档翻译状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Started,
    TitleTranslating,
    ContentTranslating,
    ExcerptTranslating,
    Completed,
    Aborted,
}

impl DocumentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentState::Completed | DocumentState::Aborted)
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentState::Started => "started",
            DocumentState::TitleTranslating => "title_translating",
            DocumentState::ContentTranslating => "content_translating",
            DocumentState::ExcerptTranslating => "excerpt_translating",
            DocumentState::Completed => "completed",
            DocumentState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// 待翻译的源文档
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// 元数据字段；只翻译配置允许的字符串值
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

/// 内容翻译结果
#[derive(Debug, Default)]
pub struct ContentTranslation {
    pub content: String,
    pub units_attempted: usize,
    pub units_failed: usize,
    pub trace: Vec<String>,
    /// 回填被中止时的错误（内容保持原文）
    pub error: Option<TranslationError>,
}

impl ContentTranslation {
    fn untouched(content: String) -> Self {
        Self {
            content,
            ..Default::default()
        }
    }

    fn absorb(&mut self, part: ContentTranslation) {
        self.content.push_str(&part.content);
        self.units_attempted += part.units_attempted;
        self.units_failed += part.units_failed;
        self.trace.extend(part.trace);
        if self.error.is_none() {
            self.error = part.error;
        }
    }
}

/// 单篇文档的翻译结果
#[derive(Debug)]
pub struct DocumentTranslation {
    pub id: Option<Value>,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    /// 翻译成功的元数据字段，按配置顺序
    pub meta: Map<String, Value>,
    /// 第一个导致中止的错误，或内容回填被中止的错误
    pub error: Option<TranslationError>,
    pub debug_trace: Vec<String>,
    pub units_attempted: usize,
    pub units_failed: usize,
    pub state: DocumentState,
}

impl DocumentTranslation {
    fn started(id: Option<Value>) -> Self {
        Self {
            id,
            title: String::new(),
            content: String::new(),
            excerpt: None,
            meta: Map::new(),
            error: None,
            debug_trace: Vec::new(),
            units_attempted: 0,
            units_failed: 0,
            state: DocumentState::Started,
        }
    }

    fn advance(&mut self, next: DocumentState) {
        if self.state.is_terminal() {
            return;
        }
        debug!("文档状态: {} → {}", self.state, next);
        self.state = next;
    }

    fn trace(&mut self, line: String) {
        debug!("{}", line);
        self.debug_trace.push(line);
    }

    fn abort(mut self, error: TranslationError) -> Self {
        warn!("❌ 文档翻译中止: {}", error);
        self.trace(format!("✗ 中止 ({}): {}", error.kind(), error));
        self.advance(DocumentState::Aborted);
        self.error = Some(error);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.state == DocumentState::Completed
    }

    pub fn units_succeeded(&self) -> usize {
        self.units_attempted - self.units_failed
    }

    /// 一行结果摘要
    pub fn summary(&self) -> String {
        match (&self.state, &self.error) {
            (DocumentState::Aborted, Some(error)) => format!("❌ 翻译中止: {}", error),
            (_, Some(error)) => format!(
                "⚠️  内容保持原文: {} ({} 个单元)",
                error, self.units_attempted
            ),
            _ if self.units_failed > 0 => format!(
                "⚠️  部分完成: {}/{} 个单元成功，{} 个失败",
                self.units_succeeded(),
                self.units_attempted,
                self.units_failed
            ),
            _ => format!("✅ 翻译完成: {} 个单元", self.units_attempted),
        }
    }

    /// 转换为可序列化的输出
    pub fn to_output(&self, include_trace: bool) -> TranslatedDocument {
        TranslatedDocument {
            id: self.id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            excerpt: self.excerpt.clone(),
            meta: self.meta.clone(),
            state: self.state,
            error: self.error.as_ref().map(|error| error.to_string()),
            units_attempted: self.units_attempted,
            units_failed: self.units_failed,
            debug_trace: if include_trace {
                self.debug_trace.clone()
            } else {
                Vec::new()
            },
        }
    }
}

/// 序列化输出格式
#[derive(Debug, Clone, Serialize)]
pub struct TranslatedDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    pub state: DocumentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub units_attempted: usize,
    pub units_failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub debug_trace: Vec<String>,
}

/// 批量翻译的取消标记
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 批量翻译报告
#[derive(Debug)]
pub struct BatchReport {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// 与输入文档按顺序对应（取消时只包含已处理的前缀）
    pub results: Vec<DocumentTranslation>,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        let elapsed = self.finished_at - self.started_at;
        format!(
            "已处理 {} 篇，成功 {} 篇，失败 {} 篇，耗时 {:.1}s{}",
            self.processed,
            self.successful,
            self.failed,
            elapsed.num_milliseconds() as f64 / 1000.0,
            if self.cancelled { "（已取消）" } else { "" }
        )
    }
}

/// 文档翻译器
///
/// 持有翻译客户端和显式传入的配置，不共享任何跨文档的可变状态。
pub struct DocumentTranslator<C> {
    client: C,
    config: PipelineConfig,
    policy: ExtractionPolicy,
}

impl<C: TranslationClient> DocumentTranslator<C> {
    pub fn new(client: C, config: PipelineConfig) -> Self {
        let policy = config.extraction_policy();
        Self {
            client,
            config,
            policy,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 翻译整篇文档；不会返回错误，失败信息记录在结果中
    pub async fn translate_document(
        &self,
        document: &SourceDocument,
        target: &str,
        source: Option<&str>,
    ) -> DocumentTranslation {
        let mut result = DocumentTranslation::started(document.id.clone());
        result.trace(format!(
            "开始翻译 → {} (内容 {} 字符)",
            target,
            document.content.chars().count()
        ));

        if let Err(e) = self.config.validate() {
            return result.abort(e);
        }
        if let Err(e) = self.client.ensure_ready().await {
            return result.abort(e);
        }

        result.advance(DocumentState::TitleTranslating);
        match self.translate_text(&document.title, target, source).await {
            Ok(title) => {
                result.trace(format!(
                    "✓ 标题 \"{}\" → \"{}\"",
                    truncate_for_trace(&document.title),
                    truncate_for_trace(&title)
                ));
                result.title = title;
            }
            Err(e) => return result.abort(e),
        }

        result.advance(DocumentState::ContentTranslating);
        let content = self
            .translate_content(&document.content, target, source)
            .await;
        result.content = content.content;
        result.units_attempted = content.units_attempted;
        result.units_failed = content.units_failed;
        for line in content.trace {
            result.trace(line);
        }
        result.error = content.error;

        result.advance(DocumentState::ExcerptTranslating);
        if let Some(excerpt) = document.excerpt.as_deref().filter(|e| !e.trim().is_empty()) {
            match self.translate_text(excerpt, target, source).await {
                Ok(translated) => {
                    result.trace(format!(
                        "✓ 摘要 \"{}\" → \"{}\"",
                        truncate_for_trace(excerpt),
                        truncate_for_trace(&translated)
                    ));
                    result.excerpt = Some(translated);
                }
                Err(e) => {
                    warn!("⚠️  摘要翻译失败，已忽略: {}", e);
                    result.trace(format!("✗ 摘要 ({}): {}", e.kind(), e));
                }
            }
        }
        self.translate_meta(&document.meta, &mut result, target, source)
            .await;

        result.advance(DocumentState::Completed);
        info!("{}", result.summary());
        result
    }

    /// 按配置的字段顺序翻译元数据；失败的字段被跳过，不影响文档
    async fn translate_meta(
        &self,
        meta: &Map<String, Value>,
        result: &mut DocumentTranslation,
        target: &str,
        source: Option<&str>,
    ) {
        for key in self.config.meta_fields() {
            let Some(value) = meta
                .get(key)
                .and_then(Value::as_str)
                .filter(|value| !value.trim().is_empty())
            else {
                continue;
            };

            match self.translate_text(value, target, source).await {
                Ok(translated) => {
                    result.trace(format!(
                        "✓ 元数据 {} \"{}\" → \"{}\"",
                        key,
                        truncate_for_trace(value),
                        truncate_for_trace(&translated)
                    ));
                    result.meta.insert(key.clone(), Value::String(translated));
                }
                Err(e) => {
                    warn!("⚠️  元数据 {} 翻译失败，已跳过: {}", key, e);
                    result.trace(format!("✗ 元数据 {} ({}): {}", key, e.kind(), e));
                }
            }
        }
    }

    /// 翻译纯文本（标题、摘要、元数据）；空文本直接返回空字符串
    pub async fn translate_text(
        &self,
        text: &str,
        target: &str,
        source: Option<&str>,
    ) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let translated = self
            .with_timeout(self.client.translate(text, target, source))
            .await?;
        if translated.trim().is_empty() {
            return Err(translation_error!(provider, self.client.name(), "译文为空"));
        }
        Ok(translated)
    }

    /// 翻译区块内容
    ///
    /// 超过分块阈值时按顶层节点分块，每块独立提取、翻译和回填后按顺序拼接。
    pub async fn translate_content(
        &self,
        content: &str,
        target: &str,
        source: Option<&str>,
    ) -> ContentTranslation {
        if content.trim().is_empty() {
            return ContentTranslation::untouched(content.to_string());
        }

        let document = Document::parse(content);
        let length = content.chars().count();
        let threshold = self.config.chunk_threshold();

        if length <= threshold {
            return self.translate_tree(&document, target, source).await;
        }

        let chunks = chunk(document.into_nodes(), threshold);
        info!(
            "📦 内容 {} 字符超过阈值 {}，分为 {} 块",
            length,
            threshold,
            chunks.len()
        );

        let mut combined = ContentTranslation::default();
        combined.trace.push(format!(
            "内容 {} 字符，分为 {} 块",
            length,
            chunks.len()
        ));
        for (index, part) in chunks.into_iter().enumerate() {
            debug!("处理第 {} 块: {} 个节点, {} 字符", index + 1, part.len(), part.size);
            let sub_document = Document::from_nodes(part.units);
            let translated = self.translate_tree(&sub_document, target, source).await;
            combined.absorb(translated);
        }
        combined
    }

    /// 提取、翻译并回填一棵文档树
    async fn translate_tree(
        &self,
        document: &Document,
        target: &str,
        source: Option<&str>,
    ) -> ContentTranslation {
        let segments = extract(document, &self.policy);
        if segments.is_empty() {
            debug!("没有可翻译的片段");
            return ContentTranslation::untouched(document.serialize());
        }

        let units = match self.config.strategy() {
            TranslationStrategy::PerSegment => {
                self.translate_segments(segments, target, source).await
            }
            TranslationStrategy::PerChunk => self.translate_grouped(segments, target, source).await,
        };

        let mut result = ContentTranslation {
            units_attempted: units.len(),
            units_failed: units.iter().filter(|unit| unit.is_failed()).count(),
            trace: units.iter().map(TranslationUnit::trace_line).collect(),
            ..Default::default()
        };

        if result.units_failed > 0 {
            warn!(
                "⚠️  {} 个单元翻译失败，保留原文",
                result.units_failed
            );
        }

        match merge(document, &units, &self.policy) {
            Ok(merged) => result.content = merged.serialize(),
            Err(e) => {
                warn!("⚠️  回填失败，保持原文: {}", e);
                result.trace.push(format!("✗ 回填 ({}): {}", e.kind(), e));
                result.content = document.serialize();
                result.error = Some(e);
            }
        }

        result
    }

    /// 逐片段调用，结果按提取顺序返回
    async fn translate_segments(
        &self,
        segments: Vec<TextSegment>,
        target: &str,
        source: Option<&str>,
    ) -> Vec<TranslationUnit> {
        stream::iter(segments.into_iter().map(|segment| async move {
            let mut unit = TranslationUnit::new(segment);
            let outcome = self
                .with_timeout(self.client.translate(&unit.segment.text, target, source))
                .await;
            match outcome {
                Ok(translated) if !translated.trim().is_empty() => unit.succeed(translated),
                Ok(_) => unit.fail("ProviderError: 译文为空"),
                Err(e) => unit.fail(format!("{}: {}", e.kind(), e)),
            };
            unit
        }))
        .buffered(self.config.max_concurrent_requests().max(1))
        .collect()
        .await
    }

    /// 按分块阈值分组，每组一次批量调用
    async fn translate_grouped(
        &self,
        segments: Vec<TextSegment>,
        target: &str,
        source: Option<&str>,
    ) -> Vec<TranslationUnit> {
        let groups = chunk(segments, self.config.chunk_threshold());
        debug!("{} 个分组批量翻译", groups.len());

        let translated: Vec<Vec<TranslationUnit>> =
            stream::iter(groups.into_iter().map(|group| async move {
                let texts: Vec<String> = group.units.iter().map(|s| s.text.clone()).collect();
                let mut units: Vec<TranslationUnit> =
                    group.units.into_iter().map(TranslationUnit::new).collect();

                match self
                    .with_timeout(self.client.translate_batch(&texts, target, source))
                    .await
                {
                    Ok(translations) => {
                        for (index, unit) in units.iter_mut().enumerate() {
                            match translations.get(index).cloned().flatten() {
                                Some(text) if !text.trim().is_empty() => unit.succeed(text),
                                _ => unit.fail("ProviderError: 批量响应中缺少该项"),
                            };
                        }
                    }
                    Err(e) => {
                        let message = format!("{}: {}", e.kind(), e);
                        for unit in &mut units {
                            unit.fail(message.clone());
                        }
                    }
                }
                units
            }))
            .buffered(self.config.max_concurrent_requests().max(1))
            .collect()
            .await;

        translated.into_iter().flatten().collect()
    }

    /// 为单次调用加上超时，超时视为该单元失败
    async fn with_timeout<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.config.request_timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(TranslationError::Network {
                message: format!("请求超时（{} 秒）", timeout.as_secs_f64()),
                status_code: None,
            }),
        }
    }

    /// 顺序翻译多篇文档，每篇之间检查取消标记
    pub async fn translate_batch(
        &self,
        documents: &[SourceDocument],
        target: &str,
        source: Option<&str>,
        cancel: &CancellationFlag,
    ) -> BatchReport {
        let started_at = Local::now();
        info!("🚀 开始批量翻译: {} 篇文档 → {}", documents.len(), target);

        let mut results = Vec::with_capacity(documents.len());
        let mut cancelled = false;

        for (index, document) in documents.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    "⏹️  批量翻译已取消，{} 篇文档未处理",
                    documents.len() - index
                );
                cancelled = true;
                break;
            }
            info!("📄 [{}/{}] 翻译文档", index + 1, documents.len());
            results.push(self.translate_document(document, target, source).await);
        }

        let successful = results.iter().filter(|r| r.is_completed()).count();
        let report = BatchReport {
            started_at,
            finished_at: Local::now(),
            processed: results.len(),
            successful,
            failed: results.len() - successful,
            results,
            cancelled,
        };
        info!("📊 {}", report.summary());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{Locator, SegmentPosition};
    use async_trait::async_trait;

    struct Upper;

    #[async_trait]
    impl TranslationClient for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        async fn translate(&self, text: &str, _: &str, _: Option<&str>) -> Result<String> {
            Ok(text.to_uppercase())
        }
    }

    fn segment(text: &str) -> TextSegment {
        TextSegment {
            text: text.to_string(),
            locator: Locator {
                path: vec![0],
                position: SegmentPosition::Text { ordinal: 0 },
            },
        }
    }

    #[test]
    fn test_unit_transitions_once() {
        let mut unit = TranslationUnit::new(segment("Hello"));
        assert!(unit.is_pending());
        assert!(unit.succeed("Hola".to_string()));
        assert!(!unit.fail("late error"));
        assert_eq!(unit.translated_text(), Some("Hola"));
        assert_eq!(unit.error(), None);
    }

    #[test]
    fn test_trace_line_truncates_text() {
        let long = "a".repeat(100);
        let mut unit = TranslationUnit::new(segment(&long));
        unit.fail("ProviderError: boom");
        let line = unit.trace_line();
        assert!(line.starts_with("✗ [0#text0]"));
        assert!(line.ends_with("ProviderError: boom"));
        assert!(line.chars().count() < 100);
    }

    #[test]
    fn test_strategy_serde_names() {
        let strategy: TranslationStrategy = serde_json::from_str("\"chunk\"").unwrap();
        assert_eq!(strategy, TranslationStrategy::PerChunk);
        let strategy: TranslationStrategy = serde_json::from_str("\"per_segment\"").unwrap();
        assert_eq!(strategy, TranslationStrategy::PerSegment);
    }

    #[tokio::test]
    async fn test_translate_text_empty_is_noop() {
        let translator = DocumentTranslator::new(Upper, PipelineConfig::default());
        assert_eq!(translator.translate_text("", "es", None).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_document_states_reach_completed() {
        let translator = DocumentTranslator::new(Upper, PipelineConfig::default());
        let document = SourceDocument {
            id: Some(Value::from(7)),
            title: "Hello".to_string(),
            content: "<p>Hello world</p>".to_string(),
            excerpt: Some("Short".to_string()),
            ..Default::default()
        };
        let result = translator.translate_document(&document, "es", None).await;

        assert_eq!(result.state, DocumentState::Completed);
        assert_eq!(result.title, "HELLO");
        assert_eq!(result.content, "<p>HELLO WORLD</p>");
        assert_eq!(result.excerpt.as_deref(), Some("SHORT"));
        assert_eq!(result.units_attempted, 1);
        assert!(result.summary().starts_with("✅"));

        let output = serde_json::to_value(result.to_output(false)).unwrap();
        assert_eq!(output["state"], "completed");
        assert_eq!(output["id"], 7);
        assert!(output.get("debug_trace").is_none());
    }

    #[tokio::test]
    async fn test_invalid_config_aborts_before_calls() {
        let translator = DocumentTranslator::new(
            Upper,
            PipelineConfig::default().with_max_concurrent_requests(0),
        );
        let result = translator
            .translate_document(&SourceDocument::default(), "es", None)
            .await;
        assert_eq!(result.state, DocumentState::Aborted);
        assert_eq!(result.error.as_ref().map(|e| e.kind()), Some("ConfigurationError"));
    }

    #[tokio::test]
    async fn test_per_chunk_strategy_uses_batches() {
        let translator = DocumentTranslator::new(
            Upper,
            PipelineConfig::default().with_strategy(TranslationStrategy::PerChunk),
        );
        let result = translator
            .translate_content("<p>One</p>\n\n<p>Two</p>", "es", None)
            .await;
        assert_eq!(result.content, "<p>ONE</p>\n\n<p>TWO</p>");
        assert_eq!(result.units_failed, 0);
    }

    #[test]
    fn test_cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        handle.cancel();
        assert!(flag.is_cancelled());
    }
}
