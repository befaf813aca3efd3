use std::path::Path;
use std::process;

use anyhow::Result;
use tracing::info;

use autologin::config::Config;
use autologin::orchestrator::App;
use autologin::utils::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let mut config = Config::from_env();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("batch") if args.len() >= 3 => {
            // 可选的并发数参数，解析不出正整数时保持配置值
            if let Some(workers) = args.get(3) {
                if let Ok(parsed) = workers.parse::<usize>() {
                    if parsed > 0 {
                        config.max_workers = parsed;
                    }
                }
            }
            let app = App::initialize(config).await;
            app.run_batch(Path::new(&args[2])).await?;
        }
        Some("login") if args.len() >= 4 => {
            let app = App::interactive(config);
            if !app.login_single(&args[2], &args[3]).await {
                process::exit(1);
            }
        }
        Some("inspect") => {
            App::inspect(&config).await?;
        }
        _ => {
            print_usage(args.first().map(String::as_str).unwrap_or("autologin"));
            process::exit(1);
        }
    }

    Ok(())
}

fn print_usage(program: &str) {
    info!("用法:");
    info!("  {} batch <账号表格.csv> [并发数]", program);
    info!("  {} login <账号> <密码>", program);
    info!("  {} inspect", program);
}
