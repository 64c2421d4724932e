use std::time::Duration;

use crate::pipeline::DocumentTranslation;

/// 运行统计
#[derive(Debug, Default)]
pub struct TranslationStats {
    pub config_time: Duration,
    pub client_init_time: Duration,
    pub file_read_time: Duration,
    pub translation_time: Duration,
    pub file_write_time: Duration,
    pub input_size: usize,
    pub output_size: usize,
    pub documents: usize,
    pub documents_completed: usize,
    pub units_attempted: usize,
    pub units_failed: usize,
}

impl TranslationStats {
    /// 累计一篇文档的翻译结果
    pub fn record(&mut self, result: &DocumentTranslation) {
        self.documents += 1;
        if result.is_completed() {
            self.documents_completed += 1;
        }
        self.units_attempted += result.units_attempted;
        self.units_failed += result.units_failed;
    }

    /// 单元成功率（百分比）
    pub fn success_rate(&self) -> f64 {
        if self.units_attempted == 0 {
            return 100.0;
        }
        (self.units_attempted - self.units_failed) as f64 / self.units_attempted as f64 * 100.0
    }
}

/// 打印性能统计
pub fn print_performance_stats(stats: &TranslationStats, total_duration: Duration) {
    println!("\n📊 性能统计报告:");
    println!("═══════════════════════════════════════");

    // 时间分解
    println!("⏱️  时间分解:");
    println!("   配置加载: {}", format_duration(stats.config_time));
    println!("   客户端初始化: {}", format_duration(stats.client_init_time));
    println!("   文件读取: {}", format_duration(stats.file_read_time));
    println!("   翻译执行: {}", format_duration(stats.translation_time));
    println!("   文件写入: {}", format_duration(stats.file_write_time));
    println!("   总耗时: {}", format_duration(total_duration));

    // 文件统计
    println!("\n📏 文件统计:");
    println!(
        "   输入大小: {} 字节 ({:.1} KB)",
        stats.input_size,
        stats.input_size as f64 / 1024.0
    );
    println!(
        "   输出大小: {} 字节 ({:.1} KB)",
        stats.output_size,
        stats.output_size as f64 / 1024.0
    );
    if stats.input_size > 0 {
        println!(
            "   大小变化: {:.1}%",
            (stats.output_size as f64 / stats.input_size as f64 - 1.0) * 100.0
        );
    }

    // 翻译统计
    println!("\n🔤 翻译统计:");
    println!(
        "   文档: {} 篇 (完成 {} 篇)",
        stats.documents, stats.documents_completed
    );
    println!("   翻译单元: {} 个", stats.units_attempted);
    println!("   失败单元: {} 个", stats.units_failed);
    println!("   成功率: {:.1}%", stats.success_rate());

    // 性能指标
    let seconds = total_duration.as_secs_f64();
    if seconds > 0.0 {
        println!("\n🚀 性能指标:");
        println!(
            "   处理速度: {:.1} KB/s",
            stats.input_size as f64 / 1024.0 / seconds
        );
        println!(
            "   单元速度: {:.1} 个/s",
            stats.units_attempted as f64 / seconds
        );
    }
}

/// 格式化持续时间
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.500s");
    }

    #[test]
    fn test_success_rate() {
        let mut stats = TranslationStats::default();
        assert_eq!(stats.success_rate(), 100.0);
        stats.units_attempted = 4;
        stats.units_failed = 1;
        assert_eq!(stats.success_rate(), 75.0);
    }
}
