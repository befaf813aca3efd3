/// 单个待处理账号
///
/// 从表格加载后不再变更，username 是一次批量运行内的唯一键。
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub username: String,
    pub password: String,
    /// 表格第 4 列起的透传字段，原样写回结果文件
    pub extra: Vec<String>,
}

impl Account {
    pub fn new(username: impl Into<String>, password: impl Into<String>, extra: Vec<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            extra,
        }
    }
}

/// 单个账号的终态处理结果
///
/// 每个被调度的账号恰好产生一条，由结果写入循环消费一次。
/// 登录成功但后续步骤失败时，余额与充值字段保持缺省值。
#[derive(Debug, Clone, PartialEq)]
pub struct AccountResult {
    pub username: String,
    pub password: String,
    pub success: bool,
    pub balance: f64,
    pub last_deposit: f64,
    pub deposit_time: String,
    pub deposit_tx_code: String,
    pub extra: Vec<String>,
}

impl AccountResult {
    /// 登录失败（含崩溃兜底）的结果记录
    pub fn failure(account: &Account) -> Self {
        Self {
            username: account.username.clone(),
            password: account.password.clone(),
            success: false,
            balance: 0.0,
            last_deposit: 0.0,
            deposit_time: String::new(),
            deposit_tx_code: String::new(),
            extra: account.extra.clone(),
        }
    }

    /// 登录成功的结果记录，余额与充值信息由后续步骤按需补充
    pub fn success(account: &Account) -> Self {
        Self {
            success: true,
            ..Self::failure(account)
        }
    }
}
