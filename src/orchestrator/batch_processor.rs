//! 批量账号处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量账号的调度和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：加载代理池、创建求解器和账号台账
//! 2. **批量加载**：读取账号表格（`Vec<Account>`）
//! 3. **并发控制**：使用 Semaphore 限制同时处理的账号数
//! 4. **结果落盘**：独立写入任务消费结果通道，串行写两个结果文件
//! 5. **对账收尾**：全部完成后运行台账一致性检查并输出统计
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个账号的细节
//! - **资源所有者**：唯一构造代理池、求解器和台账的模块，向下只传 Arc
//! - **向下委托**：委托 account_processor 包装单个账号任务

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

use crate::clients::SiteClient;
use crate::config::Config;
use crate::infrastructure::{CaptchaSolver, ProxyPool};
use crate::models::{load_account_sheet, Account, AccountResult};
use crate::orchestrator::account_processor;
use crate::services::{AccountLedger, ResultWriter};
use crate::utils::logging;
use crate::workflow::{AccountCtx, LoginFlow};

/// 交互单账号模式的验证码尝试轮数上限
const INTERACTIVE_CAPTCHA_ATTEMPTS: usize = 5;

/// 一次批量运行的汇总
#[derive(Debug)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub reconcile_ok: bool,
    pub issues: Vec<String>,
    pub success_file: PathBuf,
    pub fail_file: PathBuf,
}

/// 应用主结构
pub struct App {
    config: Config,
    ledger: Arc<AccountLedger>,
    proxy_pool: Arc<ProxyPool>,
    solver: Arc<CaptchaSolver>,
}

impl App {
    /// 初始化批量模式的应用实例
    ///
    /// 代理文件读不到只降级为不使用代理，不算初始化失败
    pub async fn initialize(config: Config) -> Self {
        logging::log_startup(config.max_workers);

        let proxy_pool = match ProxyPool::load(&config.proxy_file).await {
            Ok(pool) => {
                info!("✓ 已加载 {} 个代理", pool.len());
                pool
            }
            Err(err) => {
                warn!("⚠️ 无法加载代理文件，不使用代理运行: {:#}", err);
                ProxyPool::empty()
            }
        };

        let solver = CaptchaSolver::new(&config);

        Self {
            ledger: Arc::new(AccountLedger::new()),
            proxy_pool: Arc::new(proxy_pool),
            solver: Arc::new(solver),
            config,
        }
    }

    /// 交互单账号模式的应用实例
    ///
    /// 不加载代理，求解器固定走 pipe 模式，验证码最多尝试 5 轮
    pub fn interactive(config: Config) -> Self {
        let config = Config {
            max_captcha_attempts: INTERACTIVE_CAPTCHA_ATTEMPTS,
            ..config
        };
        let solver = Arc::new(CaptchaSolver::pipe_only(&config));

        Self {
            ledger: Arc::new(AccountLedger::new()),
            proxy_pool: Arc::new(ProxyPool::empty()),
            solver,
            config,
        }
    }

    /// 运行批量登录流水线
    ///
    /// 表格打不开是致命错误；单个账号的失败只计入统计
    pub async fn run_batch(&self, sheet_path: &Path) -> Result<BatchSummary> {
        info!("📂 读取账号表格: {}", sheet_path.display());
        let accounts = load_account_sheet(sheet_path).await?;
        if accounts.is_empty() {
            warn!("⚠️ 表格中没有有效账号");
        }

        for account in &accounts {
            self.ledger.register(&account.username);
        }
        logging::log_accounts_loaded(accounts.len(), self.config.max_workers);
        self.ledger.log_statistics();

        // 批量模式先拉起常驻求解服务，失败降级为 pipe 模式
        if let Err(err) = self.solver.start_service().await {
            warn!("⚠️ 启动验证码服务失败: {}", err);
            info!("继续以 pipe 模式处理...");
        }

        // 结果文件的透传列数跟第一个有效账号走
        let extra_count = accounts
            .first()
            .map(|account| account.extra.len())
            .unwrap_or(0);
        let writer = Arc::new(ResultWriter::create(
            Path::new(&self.config.results_dir),
            extra_count,
        )?);

        let (tx, mut rx) = mpsc::unbounded_channel::<AccountResult>();

        // 写入任务：串行落盘，每写一条报一次进度
        let writer_task = {
            let writer = Arc::clone(&writer);
            let ledger = Arc::clone(&self.ledger);
            tokio::spawn(async move {
                while let Some(result) = rx.recv().await {
                    if let Err(err) = writer.append(&result) {
                        error!("[账号 {}] 写入结果失败: {:#}", result.username, err);
                    }
                    let snap = ledger.snapshot();
                    logging::log_progress(snap.total, snap.succeeded, snap.failed, snap.in_progress);
                }
            })
        };

        // 按信号量限流派发账号任务
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let flow = Arc::new(LoginFlow::new(
            &self.config,
            Arc::clone(&self.proxy_pool),
            Arc::clone(&self.solver),
        ));

        let mut handles = Vec::new();
        for (index, account) in accounts.into_iter().enumerate() {
            let permit = semaphore.clone().acquire_owned().await?;
            let flow = Arc::clone(&flow);
            let ledger = Arc::clone(&self.ledger);
            let tx = tx.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let ctx = AccountCtx::new(account.clone(), index + 1);
                account_processor::run_guarded(flow.run(&ctx), &account, &ledger, &tx).await;
            });
            handles.push(handle);
        }

        for handle in handles {
            if let Err(err) = handle.await {
                error!("账号任务执行失败: {}", err);
            }
        }

        // 关闭通道，等写入任务清空剩余结果
        drop(tx);
        if let Err(err) = writer_task.await {
            error!("结果写入任务异常退出: {}", err);
        }
        writer.flush()?;

        self.solver.stop_service().await;

        // 对账收尾
        let (reconcile_ok, issues) = self.ledger.reconcile();
        if !reconcile_ok {
            warn!("⚠️ 发现账号计数问题:");
            for issue in &issues {
                warn!("- {}", issue);
            }
        }
        self.ledger.log_statistics();

        let snap = self.ledger.snapshot();
        logging::print_final_stats(
            snap.succeeded,
            snap.failed,
            snap.total,
            &writer.success_path().display().to_string(),
            &writer.fail_path().display().to_string(),
        );

        Ok(BatchSummary {
            total: snap.total,
            succeeded: snap.succeeded,
            failed: snap.failed,
            reconcile_ok,
            issues,
            success_file: writer.success_path().to_path_buf(),
            fail_file: writer.fail_path().to_path_buf(),
        })
    }

    /// 交互式处理单个账号，返回是否登录成功
    pub async fn login_single(&self, username: &str, password: &str) -> bool {
        let account = Account::new(username, password, Vec::new());
        let flow = LoginFlow::new(
            &self.config,
            Arc::clone(&self.proxy_pool),
            Arc::clone(&self.solver),
        );
        let ctx = AccountCtx::new(account, 1);
        let result = flow.run(&ctx).await;

        info!("{}", "=".repeat(60));
        if result.success {
            info!("✅ 登录成功: {}", result.username);
            info!("💰 余额: {:.2}", result.balance);
            if result.deposit_time.is_empty() {
                info!("未找到充值记录");
            } else {
                info!(
                    "💵 最近充值: {:.2} 于 {} [{}]",
                    result.last_deposit, result.deposit_time, result.deposit_tx_code
                );
            }
        } else {
            error!("❌ 登录失败: {}", result.username);
        }
        info!("{}", "=".repeat(60));

        result.success
    }

    /// 匿名抓取落地页并输出会话信息，用于手工核对请求头
    pub async fn inspect(config: &Config) -> Result<()> {
        info!("=== 匿名抓取落地页 ===");
        let mut client = SiteClient::new(config, "", "", None)?;
        client
            .fetch_initial_data()
            .await
            .context("获取初始数据失败")?;

        info!("User-Agent: {}", client.user_agent());
        info!("防伪 token: {}", logging::truncate_secret(client.token()));
        info!(
            "会话 Cookie: {}",
            logging::truncate_secret(client.session_cookie())
        );
        info!(
            "完整 Cookie: {}",
            logging::truncate_secret(client.cookie_header())
        );
        info!("指纹: {}", client.finger_idx());
        if !client.idy_key().is_empty() {
            info!("IdyKey: {}", logging::truncate_secret(client.idy_key()));
        }

        info!("=== 验证码接口探测 ===");
        match client.get_slider_captcha().await {
            Ok(body) => info!("✓ 已取到验证码数据 ({} 字节)", body.len()),
            Err(err) => error!("验证码接口探测失败: {}", err),
        }

        info!("=== CURL 头信息 ===");
        info!("-H 'user-agent: {}'", client.user_agent());
        info!(
            "-H 'requestverificationtoken: {}'",
            logging::truncate_secret(client.token())
        );
        info!("-b '{}'", logging::truncate_secret(client.cookie_header()));

        Ok(())
    }
}
