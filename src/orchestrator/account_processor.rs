//! 单个账号任务包装 - 编排层
//!
//! ## 职责
//!
//! 本模块包装单个账号任务的执行边界：
//!
//! 1. **台账标记**：任务开始前标记处理中，结束后按结果标记成败
//! 2. **崩溃隔离**：把任务内的 panic 折算成失败结果，不拖垮整个批次
//! 3. **结果投递**：每个被调度的账号恰好向结果通道投递一条记录

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, warn};

use crate::models::{Account, AccountResult};
use crate::services::AccountLedger;

/// 带台账标记和崩溃保护地执行单个账号任务
///
/// 任务 panic 时记为失败结果。无论任务如何结束，台账恰好被
/// 标记一次、结果通道恰好收到一条记录。
///
/// # 参数
/// - `task`: 产出账号结果的流程 future
/// - `account`: 被处理的账号
/// - `ledger`: 共享账号台账
/// - `tx`: 结果通道发送端
pub async fn run_guarded<F>(
    task: F,
    account: &Account,
    ledger: &AccountLedger,
    tx: &UnboundedSender<AccountResult>,
) where
    F: Future<Output = AccountResult>,
{
    ledger.mark_processing(&account.username);

    let result = match AssertUnwindSafe(task).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            error!(
                "[账号 {}] ❌ 处理过程中发生严重错误: {}",
                account.username,
                panic_message(panic.as_ref())
            );
            AccountResult::failure(account)
        }
    };

    if result.success {
        ledger.mark_succeeded(&account.username);
    } else {
        ledger.mark_failed(&account.username);
    }

    if tx.send(result).is_err() {
        warn!("[账号 {}] 结果通道已关闭，结果被丢弃", account.username);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "未知崩溃".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_account(username: &str) -> Account {
        Account::new(username, "pw", Vec::new())
    }

    #[tokio::test]
    async fn test_success_marks_ledger_and_sends_result() {
        let ledger = AccountLedger::new();
        let account = test_account("u1");
        ledger.register(&account.username);
        let (tx, mut rx) = mpsc::unbounded_channel();

        run_guarded(
            async { AccountResult::success(&account) },
            &account,
            &ledger,
            &tx,
        )
        .await;

        let result = rx.recv().await.expect("应收到结果");
        assert!(result.success);
        let snap = ledger.snapshot();
        assert_eq!(snap.succeeded, 1);
        assert_eq!(snap.failed, 0);
        assert_eq!(snap.in_progress, 0);
    }

    #[tokio::test]
    async fn test_panic_becomes_failure_result() {
        let ledger = AccountLedger::new();
        let account = test_account("u2");
        ledger.register(&account.username);
        let (tx, mut rx) = mpsc::unbounded_channel();

        run_guarded(
            async {
                panic!("模拟任务崩溃");
                #[allow(unreachable_code)]
                AccountResult::success(&account)
            },
            &account,
            &ledger,
            &tx,
        )
        .await;

        // 崩溃被折算成失败结果，台账同步标记
        let result = rx.recv().await.expect("应收到结果");
        assert!(!result.success);
        assert_eq!(result.username, "u2");
        let snap = ledger.snapshot();
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.in_progress, 0);
    }

    #[tokio::test]
    async fn test_closed_channel_does_not_panic() {
        let ledger = AccountLedger::new();
        let account = test_account("u3");
        ledger.register(&account.username);
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        run_guarded(
            async { AccountResult::failure(&account) },
            &account,
            &ledger,
            &tx,
        )
        .await;

        assert_eq!(ledger.snapshot().failed, 1);
    }
}
