//! Block Translate - 区块文档翻译工具库
//!
//! 从区块文档中提取可翻译文本，调用AI翻译服务，并按位置回填译文。
//! 区块结构、代码和不可翻译区域保持字节不变。

pub mod api_constants;
pub mod chunker;
pub mod classifier;
pub mod config;
pub mod document;
pub mod error;
pub mod extractor;
pub mod markup;
pub mod merger;
pub mod pipeline;
pub mod stats;
pub mod translator;
pub mod utils;

pub use config::{AppConfig, LanguageNames, PipelineConfig, ProviderSettings};
pub use document::{Block, Document, DocumentNode, Fragment};
pub use error::{Result, TranslationError};
pub use extractor::{extract, ExtractionPolicy, Locator, TextSegment};
pub use merger::merge;
pub use pipeline::{
    DocumentTranslation, DocumentTranslator, SourceDocument, TranslationStrategy, TranslationUnit,
};
pub use translator::{ProviderClient, ProviderKind, TranslationClient};
