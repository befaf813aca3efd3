//! 数据模型层
//!
//! 定义账号、处理结果与站点接口响应结构，以及账号表格加载器。
//! 不包含任何业务流程逻辑。

pub mod account;
pub mod loaders;
pub mod response;

pub use account::{Account, AccountResult};
pub use loaders::load_account_sheet;
pub use response::{
    BalanceResponse, CaptchaVerifyResponse, DepositInfo, LoginOutcome, LoginResponse,
    TransactionAccessResponse, TransactionHistoryResponse, TransactionRecord,
};
