use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::api_constants::pipeline_config;
use crate::pipeline::SourceDocument;

/// 支持的输入扩展名
const INPUT_EXTENSIONS: &[&str] = &["json", "html", "htm", "txt"];

/// 输入文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// `{id?, title, content, excerpt?}` 结构的JSON文档
    Json,
    /// 只有内容的HTML或文本文件
    Content,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Self {
        match extension_of(path).as_deref() {
            Some("json") => InputFormat::Json,
            _ => InputFormat::Content,
        }
    }
}

/// 初始化日志系统
pub fn init_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// 收集输入文件：单个文件直接返回，目录递归查找支持的扩展名
pub fn discover_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.exists() {
        anyhow::bail!("输入路径不存在: {}", input.display());
    }

    if input.is_file() {
        if !extension_of(input).is_some_and(|ext| INPUT_EXTENSIONS.contains(&ext.as_str())) {
            warn!("⚠️  未识别的文件扩展名，按内容文件处理: {}", input.display());
        }
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.with_context(|| format!("遍历目录失败: {}", input.display()))?;
        let path = entry.path();
        if entry.file_type().is_file()
            && extension_of(path).is_some_and(|ext| INPUT_EXTENSIONS.contains(&ext.as_str()))
        {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// 读取源文档；非JSON文件的全部内容作为正文
pub fn read_source_document(path: &Path) -> Result<SourceDocument> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("读取输入文件失败: {}", path.display()))?;

    match InputFormat::from_path(path) {
        InputFormat::Json => serde_json::from_str(&raw)
            .with_context(|| format!("JSON文档格式无效: {}", path.display())),
        InputFormat::Content => Ok(SourceDocument {
            content: raw,
            ..Default::default()
        }),
    }
}

/// 生成输出文件路径
///
/// 指定输出时：输入为目录则输出也视为目录，否则直接使用。
/// 未指定时在输入文件旁生成 `name_lang.ext`。
pub fn generate_output_path(input: &Path, output: Option<&Path>, lang: &str, batch: bool) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default();
    let extension = input.extension().unwrap_or_default();

    let output_name = format!(
        "{}_{}.{}",
        stem.to_string_lossy(),
        lang,
        extension.to_string_lossy()
    );

    match output {
        Some(output_path) if batch => output_path.join(output_name),
        Some(output_path) => output_path.to_path_buf(),
        None => match input.parent() {
            Some(parent) => parent.join(output_name),
            None => PathBuf::from(output_name),
        },
    }
}

/// 截断调试轨迹中的文本
pub fn truncate_for_trace(text: &str) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let limit = pipeline_config::TRACE_PREVIEW_CHARS;
    if single_line.chars().count() <= limit {
        single_line
    } else {
        let truncated: String = single_line.chars().take(limit).collect();
        format!("{}…", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_output_path() {
        let input = Path::new("/posts/hello.json");
        assert_eq!(
            generate_output_path(input, None, "es", false),
            PathBuf::from("/posts/hello_es.json")
        );
        assert_eq!(
            generate_output_path(input, Some(Path::new("/out")), "es", true),
            PathBuf::from("/out/hello_es.json")
        );
        assert_eq!(
            generate_output_path(input, Some(Path::new("/tmp/x.json")), "es", false),
            PathBuf::from("/tmp/x.json")
        );
    }

    #[test]
    fn test_truncate_for_trace() {
        assert_eq!(truncate_for_trace("short\n text"), "short text");
        let long = "é".repeat(80);
        let truncated = truncate_for_trace(&long);
        assert_eq!(truncated.chars().count(), 61);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn test_discover_inputs_walks_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.html"), "<p>B</p>").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("skip.png"), "x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.txt"), "C").unwrap();

        let files = discover_inputs(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.html", "c.txt"]);

        assert!(discover_inputs(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_read_source_document() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("post.json");
        std::fs::write(&json, r#"{"id": 3, "title": "Hi", "content": "<p>Body</p>"}"#).unwrap();
        let document = read_source_document(&json).unwrap();
        assert_eq!(document.title, "Hi");
        assert_eq!(document.excerpt, None);

        let html = dir.path().join("page.html");
        std::fs::write(&html, "<p>Body</p>").unwrap();
        let document = read_source_document(&html).unwrap();
        assert_eq!(document.title, "");
        assert_eq!(document.content, "<p>Body</p>");
    }
}
