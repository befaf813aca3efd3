//! 账号登录流程 - 流程层
//!
//! 核心职责：定义"一个账号"从落地页到交易历史的完整处理流程
//!
//! 流程顺序：
//! 1. 抓取落地页（token / Cookie / 指纹）
//! 2. 验证码循环：取图 → 求解 → 校验，拿到 IdyKey
//! 3. 登录握手（瞬时网络错误换代理重试一次）
//! 4. 登录后查询：刷新会话 → 余额 → 交易权限 → 交易历史
//!
//! 登录成功后任何查询失败都只会让结果缺字段，不会把成功改判为失败。

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::clients::SiteClient;
use crate::config::Config;
use crate::infrastructure::{format_proxy_url, CaptchaSolver, ProxyPool};
use crate::models::{
    AccountResult, BalanceResponse, CaptchaVerifyResponse, LoginOutcome,
    TransactionAccessResponse, TransactionHistoryResponse,
};
use crate::utils::logging::truncate_secret;
use crate::workflow::account_ctx::AccountCtx;

/// 验证码和网络重试之间的统一退避间隔
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// 账号登录流程
///
/// - 编排单个账号的完整处理步骤
/// - 决定何时换代理、何时重试、何时放弃
/// - 不持有 HTTP 连接（每个账号新建 SiteClient）
/// - 只依赖基础设施能力（代理池、求解器）
pub struct LoginFlow {
    config: Config,
    proxy_pool: Arc<ProxyPool>,
    solver: Arc<CaptchaSolver>,
}

impl LoginFlow {
    /// 创建新的登录流程
    pub fn new(config: &Config, proxy_pool: Arc<ProxyPool>, solver: Arc<CaptchaSolver>) -> Self {
        Self {
            config: config.clone(),
            proxy_pool,
            solver,
        }
    }

    /// 处理一个账号，任何内部错误都折算成失败结果
    ///
    /// 每次调用恰好返回一个 AccountResult，崩溃之外不会丢结果
    pub async fn run(&self, ctx: &AccountCtx) -> AccountResult {
        info!("{} === 开始处理账号 ===", ctx);
        match self.attempt(ctx).await {
            Ok(result) => result,
            Err(err) => {
                error!("{} 处理中止: {:#}", ctx, err);
                AccountResult::failure(&ctx.account)
            }
        }
    }

    async fn attempt(&self, ctx: &AccountCtx) -> Result<AccountResult> {
        let account = &ctx.account;
        let mut client = self.build_client(ctx)?;

        // ========== 步骤 1: 抓取落地页 ==========
        info!("{} 步骤 1: 获取首页初始数据...", ctx);
        client
            .fetch_initial_data()
            .await
            .context("获取初始数据失败")?;
        debug!("{} 防伪 token: {}", ctx, truncate_secret(client.token()));
        debug!(
            "{} 会话 Cookie: {}",
            ctx,
            truncate_secret(client.session_cookie())
        );
        debug!("{} 指纹: {}", ctx, client.finger_idx());

        // ========== 步骤 2-4: 验证码循环 ==========
        let idy_key = self.solve_captcha_loop(ctx, &mut client).await?;
        client.set_idy_key(idy_key);

        // ========== 步骤 5: 登录握手 ==========
        info!("{} 步骤 5: 正在登录...", ctx);
        let login_body = match client.login().await {
            Ok(body) => body,
            Err(err) if err.is_transient() && !self.proxy_pool.is_empty() => {
                warn!("{} 登录请求失败，更换代理重试: {}", ctx, err);
                client = self.build_client(ctx)?;
                if let Err(refetch_err) = client.fetch_initial_data().await {
                    error!("{} 换代理后获取初始数据失败: {}", ctx, refetch_err);
                    return Ok(AccountResult::failure(account));
                }
                match client.login().await {
                    Ok(body) => body,
                    Err(retry_err) => {
                        error!("{} 换代理后登录仍然失败: {}", ctx, retry_err);
                        return Ok(AccountResult::failure(account));
                    }
                }
            }
            Err(err) => {
                error!("{} 登录请求失败: {}", ctx, err);
                return Ok(AccountResult::failure(account));
            }
        };
        debug!("{} 登录响应: {}", ctx, login_body);

        match LoginOutcome::classify(&login_body) {
            Err(err) => {
                error!("{} 解析登录响应失败: {}", ctx, err);
                return Ok(AccountResult::failure(account));
            }
            Ok(LoginOutcome::Rejected { code, message }) => {
                error!("{} 登录被拒绝 (code={}): {}", ctx, code, message);
                return Ok(AccountResult::failure(account));
            }
            Ok(LoginOutcome::LegacyRejected { message }) => {
                error!("{} 登录失败: {}", ctx, message);
                return Ok(AccountResult::failure(account));
            }
            Ok(LoginOutcome::MissingIdentity) => {
                error!("{} 登录失败: 响应缺少账号标识", ctx);
                return Ok(AccountResult::failure(account));
            }
            Ok(LoginOutcome::Established { nick_name, .. }) => {
                info!("{} ✅ 登录成功 (昵称: {})", ctx, nick_name);
            }
        }

        // 此后的查询都是尽力而为，失败只影响结果字段
        let mut result = AccountResult::success(account);

        // ========== 步骤 6: 刷新登录后会话 ==========
        info!("{} 步骤 6: 更新登录后会话状态...", ctx);
        if let Err(err) = client.fetch_home_after_login().await {
            error!("{} 更新登录后状态失败: {}", ctx, err);
            return Ok(result);
        }

        // ========== 步骤 7: 查询余额 ==========
        info!("{} 步骤 7: 查询账号余额...", ctx);
        let balance_body = match client.get_member_balance().await {
            Ok(body) => body,
            Err(err) => {
                error!("{} 查询余额失败: {}", ctx, err);
                return Ok(result);
            }
        };
        match serde_json::from_str::<BalanceResponse>(&balance_body) {
            Ok(response) => {
                result.balance = response.amount();
                info!("{} 💰 账号余额: {:.2}", ctx, result.balance);
            }
            Err(err) => error!("{} 解析余额响应失败: {}", ctx, err),
        }

        // ========== 步骤 8: 检查交易记录权限 ==========
        info!("{} 步骤 8: 检查交易记录访问权限...", ctx);
        let access_body = match client.check_transaction_access().await {
            Ok(body) => body,
            Err(err) => {
                error!("{} 检查交易记录权限失败: {}", ctx, err);
                return Ok(result);
            }
        };
        let access = match serde_json::from_str::<TransactionAccessResponse>(&access_body) {
            Ok(response) => response,
            Err(err) => {
                error!("{} 解析权限响应失败: {}", ctx, err);
                return Ok(result);
            }
        };
        if !access.data.is_open {
            info!("{} 账号无交易记录访问权限", ctx);
            return Ok(result);
        }
        info!(
            "{} 有交易记录访问权限 (限制: {})",
            ctx, access.data.limit_count
        );

        // ========== 步骤 9: 拉取交易历史 ==========
        info!("{} 步骤 9: 拉取交易历史...", ctx);
        match client.get_transaction_history().await {
            Ok(history_body) => {
                match serde_json::from_str::<TransactionHistoryResponse>(&history_body) {
                    Ok(history) => {
                        info!("{} 找到 {} 笔交易", ctx, history.data.records.len());
                        if let Some(deposit) = history.latest_deposit() {
                            info!(
                                "{} 💵 最近充值: {:.2} 于 {} [{}]",
                                ctx, deposit.amount, deposit.time, deposit.tx_code
                            );
                            result.last_deposit = deposit.amount;
                            result.deposit_time = deposit.time;
                            result.deposit_tx_code = deposit.tx_code;
                        }
                    }
                    Err(err) => error!("{} 解析交易历史失败: {}", ctx, err),
                }
            }
            Err(err) => error!("{} 拉取交易历史失败: {}", ctx, err),
        }

        Ok(result)
    }

    /// 验证码循环：取图、求解、校验，直到拿到 IdyKey 或轮数耗尽
    ///
    /// 取图阶段的瞬时网络错误会触发换代理并重建整个会话；
    /// 其余阶段的错误等 1 秒后直接进入下一轮
    async fn solve_captcha_loop(
        &self,
        ctx: &AccountCtx,
        client: &mut SiteClient,
    ) -> Result<String> {
        let max_attempts = self.config.max_captcha_attempts;
        info!("{} 开始验证码求解流程 (最多 {} 轮)...", ctx, max_attempts);

        for attempt in 1..=max_attempts {
            // ========== 步骤 2: 取验证码 ==========
            info!(
                "{} 步骤 2: 获取滑块验证码 ({}/{})...",
                ctx, attempt, max_attempts
            );
            let captcha_json = match client.get_slider_captcha().await {
                Ok(json) => json,
                Err(err) => {
                    error!("{} 获取验证码失败: {}", ctx, err);
                    if err.is_transient() {
                        self.rotate_session(ctx, client).await;
                    }
                    sleep(RETRY_BACKOFF).await;
                    continue;
                }
            };

            // ========== 步骤 3: 求解 ==========
            info!("{} 步骤 3: 求解验证码...", ctx);
            let started = Instant::now();
            let x = match self.solver.solve(&captcha_json).await {
                Ok(x) => x,
                Err(err) => {
                    error!("{} 求解验证码失败: {}", ctx, err);
                    sleep(RETRY_BACKOFF).await;
                    continue;
                }
            };
            info!(
                "{} 已求得滑块位置 X = {} ({:.2} 秒)",
                ctx,
                x,
                started.elapsed().as_secs_f64()
            );

            // ========== 步骤 4: 校验 ==========
            info!("{} 步骤 4: 校验验证码...", ctx);
            let verify_body = match client.check_slider_captcha(x).await {
                Ok(body) => body,
                Err(err) => {
                    error!("{} 校验验证码失败: {}", ctx, err);
                    sleep(RETRY_BACKOFF).await;
                    continue;
                }
            };

            let response: CaptchaVerifyResponse = match serde_json::from_str(&verify_body) {
                Ok(response) => response,
                Err(err) => {
                    error!("{} 解析校验结果失败: {}", ctx, err);
                    sleep(RETRY_BACKOFF).await;
                    continue;
                }
            };

            match response.idy_key() {
                Some(key) => {
                    info!("{} ✅ 验证码校验通过", ctx);
                    return Ok(key.to_string());
                }
                None => {
                    info!("{} 验证码校验未通过，重试...", ctx);
                    sleep(RETRY_BACKOFF).await;
                }
            }
        }

        bail!("验证码在 {} 轮内未能通过", max_attempts)
    }

    /// 从代理池取下一个代理并构建全新的站点客户端
    ///
    /// 池为空或条目格式无效时直连
    fn build_client(&self, ctx: &AccountCtx) -> Result<SiteClient> {
        let proxy_url = self.proxy_pool.next_proxy().and_then(|entry| {
            let url = format_proxy_url(&entry);
            if url.is_some() {
                info!("{} 使用代理: {}", ctx, entry);
            } else {
                warn!("{} 代理条目格式无效，改为直连: {}", ctx, entry);
            }
            url
        });
        SiteClient::new(
            &self.config,
            &ctx.account.username,
            &ctx.account.password,
            proxy_url.as_deref(),
        )
    }

    /// 连接异常后换代理并重建会话
    ///
    /// 重建失败只记日志，验证码循环会继续用当前会话重试
    async fn rotate_session(&self, ctx: &AccountCtx, client: &mut SiteClient) {
        if self.proxy_pool.is_empty() {
            return;
        }
        info!("{} 检测到连接异常，更换代理重建会话", ctx);
        match self.build_client(ctx) {
            Ok(fresh) => {
                *client = fresh;
                if let Err(err) = client.fetch_initial_data().await {
                    error!("{} 换代理后获取初始数据失败: {}", ctx, err);
                }
            }
            Err(err) => error!("{} 换代理后重建客户端失败: {}", ctx, err),
        }
    }
}
