//! 账号处理上下文
//!
//! 封装"我正在处理表格里第几行的哪个账号"这一信息

use std::fmt::Display;

use crate::models::Account;

/// 账号处理上下文
///
/// 包含处理单个账号所需的全部上下文信息
#[derive(Debug, Clone)]
pub struct AccountCtx {
    /// 待处理账号
    pub account: Account,

    /// 账号在表格中的行号（仅用于日志显示）
    pub row_index: usize,
}

impl AccountCtx {
    /// 创建新的账号上下文
    pub fn new(account: Account, row_index: usize) -> Self {
        Self { account, row_index }
    }
}

impl Display for AccountCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[账号 {}]", self.account.username)
    }
}
