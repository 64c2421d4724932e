use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

use block_translate::config::Cli;
use block_translate::pipeline::{CancellationFlag, DocumentTranslator, SourceDocument};
use block_translate::stats::{format_duration, print_performance_stats, TranslationStats};
use block_translate::translator::ProviderClient;
use block_translate::utils::{
    discover_inputs, generate_output_path, init_logging, read_source_document, InputFormat,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统
    init_logging(cli.verbose, cli.quiet);

    // 开始性能计时
    let total_start = Instant::now();

    match run(&cli).await {
        Ok(stats) => {
            let total_duration = total_start.elapsed();

            if !cli.quiet {
                info!("✅ 处理完成！总耗时: {}", format_duration(total_duration));
            }

            // 显示性能统计
            if cli.stats || cli.verbose {
                print_performance_stats(&stats, total_duration);
            }
        }
        Err(e) => {
            error!("❌ 翻译失败: {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// 翻译核心流程
async fn run(cli: &Cli) -> Result<TranslationStats> {
    let mut stats = TranslationStats::default();

    let config_start = Instant::now();
    let config = cli.resolve_config().context("加载配置失败")?;
    stats.config_time = config_start.elapsed();

    let init_start = Instant::now();
    let client = ProviderClient::new(config.provider.clone(), config.languages.clone())
        .context("创建翻译客户端失败")?;
    stats.client_init_time = init_start.elapsed();

    if cli.check {
        info!("🔌 测试 {} 连接 (模型: {})", config.provider.kind(), config.provider.model());
        client.test_connection().await.context("连接测试失败")?;
        return Ok(stats);
    }

    // 收集并读取输入
    let read_start = Instant::now();
    let inputs = discover_inputs(&cli.input)?;
    if inputs.is_empty() {
        anyhow::bail!("没有找到可翻译的文件: {}", cli.input.display());
    }
    let batch = cli.input.is_dir();
    if batch {
        if let Some(output_dir) = &cli.output {
            std::fs::create_dir_all(output_dir)
                .with_context(|| format!("创建输出目录失败: {}", output_dir.display()))?;
        }
    }

    let mut documents: Vec<SourceDocument> = Vec::with_capacity(inputs.len());
    for path in &inputs {
        let document = read_source_document(path)?;
        stats.input_size += document.title.len()
            + document.content.len()
            + document.excerpt.as_ref().map_or(0, String::len);
        documents.push(document);
    }
    stats.file_read_time = read_start.elapsed();

    if !cli.quiet {
        info!("🚀 启动区块翻译");
        info!("📂 输入: {} ({} 个文件)", cli.input.display(), inputs.len());
        info!("🌐 目标语言: {}", cli.lang);
        info!(
            "🤖 服务商: {} / {}",
            config.provider.kind(),
            config.provider.model()
        );
    }

    // Ctrl-C 只在文档之间生效，已完成的文档照常写出
    let cancel = CancellationFlag::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏹️  收到中断信号，当前文档完成后停止");
            handle.cancel();
        }
    });

    let translate_start = Instant::now();
    let translator = DocumentTranslator::new(client, config.pipeline.clone());
    let report = translator
        .translate_batch(&documents, &cli.lang, cli.source_lang.as_deref(), &cancel)
        .await;
    stats.translation_time = translate_start.elapsed();

    // 写出结果
    let write_start = Instant::now();
    for (path, result) in inputs.iter().zip(&report.results) {
        stats.record(result);
        info!("📄 {}: {}", path.display(), result.summary());

        if cli.trace {
            for line in &result.debug_trace {
                println!("{}", line);
            }
        }

        if !result.is_completed() {
            continue;
        }

        let output_path = generate_output_path(path, cli.output.as_deref(), &cli.lang, batch);
        let rendered = match InputFormat::from_path(path) {
            InputFormat::Json => serde_json::to_string_pretty(&result.to_output(cli.trace))
                .context("序列化翻译结果失败")?,
            InputFormat::Content => result.content.clone(),
        };
        write_output(&output_path, &rendered)?;
        stats.output_size += rendered.len();
        info!("💾 已写入: {}", output_path.display());
    }
    stats.file_write_time = write_start.elapsed();

    if report.cancelled {
        warn!(
            "⏹️  已取消: {} 个文件未处理",
            inputs.len() - report.processed
        );
    }
    if report.failed > 0 {
        anyhow::bail!("{} 篇文档翻译中止，详见日志", report.failed);
    }

    Ok(stats)
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("创建目录失败: {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("写入文件失败: {}", path.display()))
}
