//! 账号台账 - 业务能力层
//!
//! 维护批量处理过程中每个账号的状态（待处理、处理中、成功、失败）
//! 和对应计数，处理结束后做一次对账，把计数漂移修正回来并报告
//! 发现的问题

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{info, warn};

/// 处理中状态超过该时长视为卡死，对账时按失败处理
const STALE_PROCESSING: Duration = Duration::from_secs(120);

/// 台账某一时刻的计数快照
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub in_progress: usize,
}

#[derive(Default)]
struct LedgerState {
    total: usize,
    succeeded: usize,
    failed: usize,
    known: HashSet<String>,
    in_progress: HashMap<String, Instant>,
    success_set: HashSet<String>,
    failed_set: HashSet<String>,
}

/// 账号台账
///
/// 职责：
/// - 跟踪每个账号的处理状态和全局计数
/// - 终态只记一次：成功优先于失败，失败后补报成功会迁移
/// - 对账修复卡死、漏处理和重复计数
pub struct AccountLedger {
    inner: Mutex<LedgerState>,
}

impl Default for AccountLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerState::default()),
        }
    }

    /// 登记一个待处理账号，重复登记不增加总数
    ///
    /// # 返回
    /// 首次登记返回 true
    pub fn register(&self, username: &str) -> bool {
        let mut state = self.lock();
        let inserted = state.known.insert(username.to_string());
        if inserted {
            state.total += 1;
        }
        inserted
    }

    /// 标记账号进入处理中
    ///
    /// 不在名单里的账号就地补登并计入总数
    pub fn mark_processing(&self, username: &str) {
        let mut state = self.lock();
        if !state.known.contains(username) {
            state.known.insert(username.to_string());
            state.total += 1;
            warn!(username, "⚠️ 标记了不在初始名单中的账号");
        }
        state.in_progress.insert(username.to_string(), Instant::now());
    }

    /// 标记账号处理成功
    ///
    /// 已记失败的账号迁移为成功；重复成功只告警不重复计数
    pub fn mark_succeeded(&self, username: &str) {
        let mut state = self.lock();
        state.in_progress.remove(username);

        if !state.success_set.contains(username) && !state.failed_set.contains(username) {
            state.success_set.insert(username.to_string());
            state.succeeded += 1;
        } else if state.failed_set.contains(username) {
            state.failed_set.remove(username);
            state.failed = state.failed.saturating_sub(1);
            state.success_set.insert(username.to_string());
            state.succeeded += 1;
            warn!(username, "账号从失败迁移为成功");
        } else {
            warn!(username, "账号已标记过成功");
        }
    }

    /// 标记账号处理失败
    ///
    /// 已记成功的账号保持成功不动；重复失败只告警不重复计数
    pub fn mark_failed(&self, username: &str) {
        let mut state = self.lock();
        state.in_progress.remove(username);

        if !state.failed_set.contains(username) && !state.success_set.contains(username) {
            state.failed_set.insert(username.to_string());
            state.failed += 1;
        } else if state.success_set.contains(username) {
            warn!(username, "账号已成功，忽略后续的失败标记");
        } else {
            warn!(username, "账号已标记过失败");
        }
    }

    /// 取当前计数快照
    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.lock();
        LedgerSnapshot {
            total: state.total,
            succeeded: state.succeeded,
            failed: state.failed,
            in_progress: state.in_progress.len(),
        }
    }

    /// 输出当前统计
    pub fn log_statistics(&self) {
        let state = self.lock();
        info!(
            total = state.total,
            succeeded = state.succeeded,
            failed = state.failed,
            in_progress = state.in_progress.len(),
            "📊 当前账号统计"
        );
    }

    /// 对账：检查并修复计数漂移
    ///
    /// 依次处理四类问题：卡在处理中超时的账号按失败补记；同时被
    /// 记成功和失败的去掉失败；名单里从未走到终态的补记失败；
    /// 最后把计数和集合同步。每个问题都会生成一条描述
    ///
    /// # 返回
    /// (是否完全一致, 问题列表)
    pub fn reconcile(&self) -> (bool, Vec<String>) {
        self.reconcile_with_threshold(STALE_PROCESSING)
    }

    fn reconcile_with_threshold(&self, threshold: Duration) -> (bool, Vec<String>) {
        let mut state = self.lock();
        let mut issues = Vec::new();

        // 卡在处理中的账号
        let now = Instant::now();
        let stale: Vec<String> = state
            .in_progress
            .iter()
            .filter(|(_, started)| now.duration_since(**started) > threshold)
            .map(|(username, _)| username.clone())
            .collect();
        for username in stale {
            issues.push(format!("账号 {} 在处理中卡住", username));
            state.in_progress.remove(&username);
            if !state.success_set.contains(&username) && !state.failed_set.contains(&username) {
                state.failed_set.insert(username);
                state.failed += 1;
            }
        }

        // 同时出现在成功和失败集合里的账号
        let doubled: Vec<String> = state
            .success_set
            .iter()
            .filter(|username| state.failed_set.contains(*username))
            .cloned()
            .collect();
        for username in doubled {
            issues.push(format!("账号 {} 同时被计入成功和失败", username));
            state.failed_set.remove(&username);
            state.failed = state.failed.saturating_sub(1);
        }

        // 名单里从未走到终态的账号
        let unprocessed: Vec<String> = state
            .known
            .iter()
            .filter(|username| {
                !state.success_set.contains(*username)
                    && !state.failed_set.contains(*username)
                    && !state.in_progress.contains_key(*username)
            })
            .cloned()
            .collect();
        for username in unprocessed {
            issues.push(format!("账号 {} 未被处理", username));
            state.failed_set.insert(username);
            state.failed += 1;
        }

        // 计数与集合同步
        if state.succeeded + state.failed != state.total {
            issues.push(format!(
                "总数不一致: {} 成功 + {} 失败 != {} 总数",
                state.succeeded, state.failed, state.total
            ));

            let actual_success = state.success_set.len();
            let actual_failed = state.failed_set.len();

            if state.succeeded != actual_success {
                issues.push(format!(
                    "成功计数与集合不一致: 计数 = {}, 集合 = {}",
                    state.succeeded, actual_success
                ));
                state.succeeded = actual_success;
            }
            if state.failed != actual_failed {
                issues.push(format!(
                    "失败计数与集合不一致: 计数 = {}, 集合 = {}",
                    state.failed, actual_failed
                ));
                state.failed = actual_failed;
            }

            if state.succeeded + state.failed != state.total {
                issues.push(format!(
                    "校正后总数仍不一致: {} 成功 + {} 失败 != {} 总数",
                    state.succeeded, state.failed, state.total
                ));

                let actual_total = state.known.len();
                if actual_total != state.total {
                    issues.push(format!(
                        "账号总数与名单不一致: 计数 = {}, 名单 = {}",
                        state.total, actual_total
                    ));
                    state.total = actual_total;
                }
            }
        }

        (issues.is_empty(), issues)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_register_is_idempotent() {
        let ledger = AccountLedger::new();
        assert!(ledger.register("user1"));
        assert!(!ledger.register("user1"));
        assert!(ledger.register("user2"));
        assert_eq!(ledger.snapshot().total, 2);
    }

    #[test]
    fn test_mark_succeeded_counts_once() {
        let ledger = AccountLedger::new();
        ledger.register("user1");
        ledger.mark_processing("user1");
        ledger.mark_succeeded("user1");
        ledger.mark_succeeded("user1");

        let snap = ledger.snapshot();
        assert_eq!(snap.succeeded, 1);
        assert_eq!(snap.failed, 0);
        assert_eq!(snap.in_progress, 0);
    }

    #[test]
    fn test_failure_then_success_migrates() {
        let ledger = AccountLedger::new();
        ledger.register("user1");
        ledger.mark_processing("user1");
        ledger.mark_failed("user1");
        assert_eq!(ledger.snapshot().failed, 1);

        // 迟到的成功把账号从失败侧搬过来
        ledger.mark_succeeded("user1");
        let snap = ledger.snapshot();
        assert_eq!(snap.succeeded, 1);
        assert_eq!(snap.failed, 0);
    }

    #[test]
    fn test_success_then_failure_keeps_success() {
        let ledger = AccountLedger::new();
        ledger.register("user1");
        ledger.mark_processing("user1");
        ledger.mark_succeeded("user1");
        ledger.mark_failed("user1");

        let snap = ledger.snapshot();
        assert_eq!(snap.succeeded, 1);
        assert_eq!(snap.failed, 0);
    }

    #[test]
    fn test_mark_processing_registers_unknown_account() {
        let ledger = AccountLedger::new();
        ledger.register("user1");
        ledger.mark_processing("stranger");

        let snap = ledger.snapshot();
        assert_eq!(snap.total, 2);
        assert_eq!(snap.in_progress, 1);
    }

    #[test]
    fn test_reconcile_clean_run() {
        let ledger = AccountLedger::new();
        ledger.register("a");
        ledger.register("b");
        ledger.mark_processing("a");
        ledger.mark_succeeded("a");
        ledger.mark_processing("b");
        ledger.mark_failed("b");

        let (ok, issues) = ledger.reconcile();
        assert!(ok, "问题: {:?}", issues);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_reconcile_stale_in_progress_counted_failed() {
        let ledger = AccountLedger::new();
        ledger.register("slow");
        ledger.mark_processing("slow");

        // 零阈值下任何处理中的账号都视为卡死
        let (ok, issues) = ledger.reconcile_with_threshold(Duration::ZERO);
        assert!(!ok);
        assert!(issues.iter().any(|issue| issue.contains("卡住")));

        let snap = ledger.snapshot();
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.in_progress, 0);
        assert_eq!(snap.succeeded + snap.failed, snap.total);
    }

    #[test]
    fn test_reconcile_unprocessed_counted_failed() {
        let ledger = AccountLedger::new();
        ledger.register("seen");
        ledger.register("missed");
        ledger.mark_processing("seen");
        ledger.mark_succeeded("seen");

        let (ok, issues) = ledger.reconcile();
        assert!(!ok);
        assert!(issues.iter().any(|issue| issue.contains("missed") && issue.contains("未被处理")));

        let snap = ledger.snapshot();
        assert_eq!(snap.succeeded, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.succeeded + snap.failed, snap.total);
    }

    #[test]
    fn test_reconcile_double_count_drops_failure() {
        let ledger = AccountLedger::new();
        ledger.register("dup");
        {
            // 直接制造"两边都记了"的损坏状态
            let mut state = ledger.lock();
            state.success_set.insert("dup".to_string());
            state.succeeded += 1;
            state.failed_set.insert("dup".to_string());
            state.failed += 1;
        }

        let (ok, issues) = ledger.reconcile();
        assert!(!ok);
        assert!(issues.iter().any(|issue| issue.contains("同时被计入")));

        let snap = ledger.snapshot();
        assert_eq!(snap.succeeded, 1);
        assert_eq!(snap.failed, 0);
    }

    #[test]
    fn test_concurrent_marks_stay_consistent() {
        let ledger = Arc::new(AccountLedger::new());
        for i in 0..32 {
            ledger.register(&format!("user{}", i));
        }

        let mut handles = Vec::new();
        for i in 0..32 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                let username = format!("user{}", i);
                ledger.mark_processing(&username);
                if i % 2 == 0 {
                    ledger.mark_succeeded(&username);
                } else {
                    ledger.mark_failed(&username);
                }
            }));
        }
        for handle in handles {
            handle.join().expect("线程不应崩溃");
        }

        let snap = ledger.snapshot();
        assert_eq!(snap.total, 32);
        assert_eq!(snap.succeeded, 16);
        assert_eq!(snap.failed, 16);
        assert_eq!(snap.in_progress, 0);

        let (ok, issues) = ledger.reconcile();
        assert!(ok, "问题: {:?}", issues);
    }
}
