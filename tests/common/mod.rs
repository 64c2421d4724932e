/*!
 * 测试公共工具：模拟翻译客户端
 */

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use block_translate::pipeline::CancellationFlag;
use block_translate::{translation_error, Result, TranslationClient};

/// 按精确映射翻译，未知文本返回服务商错误
pub struct MapClient {
    entries: HashMap<String, String>,
    calls: AtomicUsize,
}

impl MapClient {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationClient for MapClient {
    fn name(&self) -> &str {
        "map"
    }

    async fn translate(&self, text: &str, _target: &str, _source: Option<&str>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entries
            .get(text)
            .cloned()
            .ok_or_else(|| translation_error!(provider, "map", format!("no entry for {:?}", text)))
    }
}

/// 转为大写，对指定文本返回失败
pub struct UpperClient {
    failing: Vec<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl UpperClient {
    pub fn new() -> Self {
        Self {
            failing: Vec::new(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.push(text.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationClient for UpperClient {
    fn name(&self) -> &str {
        "upper"
    }

    async fn translate(&self, text: &str, _target: &str, _source: Option<&str>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.iter().any(|failing| failing == text) {
            return Err(translation_error!(provider, "upper", "rate limited", 429));
        }
        Ok(text.to_uppercase())
    }
}

/// 序号越小等待越久，调用按相反顺序完成
pub struct ReverseTimingClient {
    pub order: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl TranslationClient for ReverseTimingClient {
    fn name(&self) -> &str {
        "reverse"
    }

    async fn translate(&self, text: &str, _target: &str, _source: Option<&str>) -> Result<String> {
        let rank: u64 = text
            .trim_start_matches("Item ")
            .parse()
            .unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(60u64.saturating_sub(rank * 10))).await;
        self.order.lock().unwrap().push(text.to_string());
        Ok(format!("Elemento {}", rank))
    }
}

/// 第一次调用时触发取消标记
pub struct CancellingClient {
    pub flag: CancellationFlag,
}

#[async_trait]
impl TranslationClient for CancellingClient {
    fn name(&self) -> &str {
        "cancelling"
    }

    async fn translate(&self, text: &str, _target: &str, _source: Option<&str>) -> Result<String> {
        self.flag.cancel();
        Ok(format!("[{}]", text))
    }
}

/// 报告缺少凭据
pub struct UnconfiguredClient;

#[async_trait]
impl TranslationClient for UnconfiguredClient {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn translate(&self, _text: &str, _target: &str, _source: Option<&str>) -> Result<String> {
        panic!("translate must not be called without credentials");
    }

    async fn ensure_ready(&self) -> Result<()> {
        Err(translation_error!(config, "api_key", "missing"))
    }
}

/// 用区块分隔符包裹段落
pub fn paragraph_block(text: &str) -> String {
    format!(
        "<!-- wp:paragraph -->\n<p>{}</p>\n<!-- /wp:paragraph -->",
        text
    )
}
