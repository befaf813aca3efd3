/// 日志工具模块
///
/// 提供日志初始化、进度渲染和敏感信息截断的辅助函数
use tracing::info;

/// 敏感值日志显示的最大长度（超出则只保留首尾各一半）
const SECRET_DISPLAY_LEN: usize = 30;

/// 进度条宽度（字符数）
const PROGRESS_BAR_WIDTH: usize = 30;

/// 初始化全局日志输出
///
/// 默认级别 info，可通过 RUST_LOG 环境变量覆盖
pub fn init() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `max_workers`: 最大并发数
pub fn log_startup(max_workers: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量账号登录模式");
    info!("📊 最大并发数: {}", max_workers);
    info!("{}", "=".repeat(60));
}

/// 记录账号加载信息
///
/// # 参数
/// - `total`: 有效账号总数
/// - `max_workers`: 最大并发数
pub fn log_accounts_loaded(total: usize, max_workers: usize) {
    info!("✓ 找到 {} 个待处理的账号", total);
    info!("📋 最多同时处理 {} 个账号\n", max_workers);
}

/// 记录批量处理进度
///
/// 每写入一条结果后调用一次
///
/// # 参数
/// - `total`: 账号总数
/// - `succeeded`: 已成功数
/// - `failed`: 已失败数
/// - `in_progress`: 处理中数量
pub fn log_progress(total: usize, succeeded: usize, failed: usize, in_progress: usize) {
    let done = succeeded + failed;
    let percent = if total > 0 {
        done as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    info!(
        "📈 进度 [{:<width$}] {:.1}% ({}/{})",
        render_bar(done, total),
        percent,
        done,
        total,
        width = PROGRESS_BAR_WIDTH
    );
    info!(
        "   ■ 成功: {}  □ 失败: {}  ⏳ 处理中: {}",
        succeeded, failed, in_progress
    );
}

/// 打印最终统计信息
///
/// # 参数
/// - `succeeded`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 总数
/// - `success_file`: 成功结果文件路径
/// - `fail_file`: 失败结果文件路径
pub fn print_final_stats(
    succeeded: usize,
    failed: usize,
    total: usize,
    success_file: &str,
    fail_file: &str,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 批量登录完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", succeeded, total);
    info!("❌ 失败: {}", failed);
    let rate = if total > 0 {
        succeeded as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    info!("📈 成功率: {:.2}%", rate);
    info!("{}", "=".repeat(60));
    info!("成功结果已保存至: {}", success_file);
    info!("失败结果已保存至: {}", fail_file);
}

/// 截断敏感值用于日志显示
///
/// 超过 30 字符时只保留首尾各 15 字符，避免完整 token / cookie 进入日志
///
/// # 参数
/// - `value`: 原始值
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= SECRET_DISPLAY_LEN {
        return value.to_string();
    }
    let half = SECRET_DISPLAY_LEN / 2;
    let head: String = chars[..half].iter().collect();
    let tail: String = chars[chars.len() - half..].iter().collect();
    format!("{}...{}", head, tail)
}

/// 渲染进度条填充部分
fn render_bar(done: usize, total: usize) -> String {
    let filled = if total > 0 {
        (done * PROGRESS_BAR_WIDTH) / total
    } else {
        0
    };
    "█".repeat(filled.min(PROGRESS_BAR_WIDTH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_secret_short_value_unchanged() {
        assert_eq!(truncate_secret("abc"), "abc");
        let exactly_30 = "a".repeat(30);
        assert_eq!(truncate_secret(&exactly_30), exactly_30);
    }

    #[test]
    fn test_truncate_secret_long_value_keeps_head_and_tail() {
        let value = "0123456789abcdefghijklmnopqrstuvwxyz";
        let out = truncate_secret(value);
        assert_eq!(out, "0123456789abcde...lmnopqrstuvwxyz");
        assert_eq!(out.chars().count(), 33);
    }

    #[test]
    fn test_render_bar_proportions() {
        assert_eq!(render_bar(0, 10), "");
        assert_eq!(render_bar(5, 10), "█".repeat(15));
        assert_eq!(render_bar(10, 10), "█".repeat(30));
        // 总数为 0 时不渲染
        assert_eq!(render_bar(0, 0), "");
    }
}
