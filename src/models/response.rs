//! 站点接口响应结构
//!
//! 所有字段都带 `#[serde(default)]`，缺字段的响应按零值处理，
//! 与真实接口新旧两代返回体兼容。

use chrono::NaiveDateTime;
use serde::Deserialize;

/// 滑块验证码验证接口返回
#[derive(Debug, Default, Deserialize)]
pub struct CaptchaVerifyResponse {
    #[serde(rename = "Data", default)]
    pub data: CaptchaVerifyData,
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptchaVerifyData {
    #[serde(rename = "Message", default)]
    pub message: String,
}

impl CaptchaVerifyResponse {
    /// 验证通过时 Message 字段携带后续登录用的 IdyKey
    pub fn idy_key(&self) -> Option<&str> {
        if self.data.message.is_empty() {
            None
        } else {
            Some(&self.data.message)
        }
    }
}

/// 登录接口返回体（同时覆盖新旧两代字段）
#[derive(Debug, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "Status", default)]
    pub status: i64,
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Data", default)]
    pub data: LoginData,
    #[serde(rename = "Error", default)]
    pub error: LoginErrorBody,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginData {
    #[serde(rename = "AccountID", default)]
    pub account_id: String,
    #[serde(rename = "NickName", default)]
    pub nick_name: String,
    #[serde(rename = "CookieID", default)]
    pub cookie_id: String,
    #[serde(rename = "IsSuccess", default)]
    pub is_success: bool,
    #[serde(rename = "Message", default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginErrorBody {
    #[serde(rename = "Code", default)]
    pub code: i64,
    #[serde(rename = "Message", default)]
    pub message: String,
}

/// 登录响应的归类结果
///
/// 按固定优先级依次判定：显式错误体 → 旧版失败标记 →
/// 缺少账号标识 → 会话建立成功。三种拒绝形态都是终态失败，不重试。
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// 会话建立成功
    Established {
        account_id: String,
        cookie_id: String,
        nick_name: String,
    },
    /// 新版接口的显式错误体
    Rejected { code: i64, message: String },
    /// 旧版接口 IsSuccess=false 且带失败消息
    LegacyRejected { message: String },
    /// 响应缺少 AccountID 或 CookieID
    MissingIdentity,
}

impl LoginOutcome {
    /// 解析并归类登录响应原文
    pub fn classify(raw: &str) -> Result<Self, serde_json::Error> {
        let response: LoginResponse = serde_json::from_str(raw)?;
        Ok(Self::from_response(response))
    }

    fn from_response(response: LoginResponse) -> Self {
        if response.error.code > 0 || !response.error.message.is_empty() {
            return LoginOutcome::Rejected {
                code: response.error.code,
                message: response.error.message,
            };
        }
        if !response.data.is_success && !response.data.message.is_empty() {
            return LoginOutcome::LegacyRejected {
                message: response.data.message,
            };
        }
        if response.data.account_id.is_empty() || response.data.cookie_id.is_empty() {
            return LoginOutcome::MissingIdentity;
        }
        LoginOutcome::Established {
            account_id: response.data.account_id,
            cookie_id: response.data.cookie_id,
            nick_name: response.data.nick_name,
        }
    }
}

/// 余额接口返回
#[derive(Debug, Default, Deserialize)]
pub struct BalanceResponse {
    #[serde(rename = "Data", default)]
    pub data: BalanceData,
}

#[derive(Debug, Default, Deserialize)]
pub struct BalanceData {
    #[serde(rename = "BalanceAmount", default)]
    pub balance_amount: f64,
    #[serde(rename = "WalletData", default)]
    pub wallet_data: WalletData,
}

#[derive(Debug, Default, Deserialize)]
pub struct WalletData {
    #[serde(rename = "BalanceAmount", default)]
    pub balance_amount: f64,
}

impl BalanceResponse {
    /// 新旧两代接口分别把余额放在 Data.BalanceAmount 与
    /// Data.WalletData.BalanceAmount，取先出现的非零值
    pub fn amount(&self) -> f64 {
        if self.data.balance_amount != 0.0 {
            self.data.balance_amount
        } else {
            self.data.wallet_data.balance_amount
        }
    }
}

/// 交易记录访问权限接口返回
#[derive(Debug, Default, Deserialize)]
pub struct TransactionAccessResponse {
    #[serde(rename = "Data", default)]
    pub data: TransactionAccessData,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionAccessData {
    #[serde(rename = "IsOpen", default)]
    pub is_open: bool,
    #[serde(rename = "LimitCount", default)]
    pub limit_count: i64,
}

/// 交易历史接口返回
#[derive(Debug, Default, Deserialize)]
pub struct TransactionHistoryResponse {
    #[serde(rename = "Data", default)]
    pub data: TransactionPage,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionPage {
    #[serde(rename = "Data", default)]
    pub records: Vec<TransactionRecord>,
    #[serde(rename = "Pager", default)]
    pub pager: TransactionPager,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionPager {
    #[serde(rename = "TotalItemCount", default)]
    pub total_item_count: i64,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "TransactionNumber", default)]
    pub transaction_number: String,
    #[serde(rename = "CreateTime", default)]
    pub create_time: String,
    #[serde(rename = "TransType", default)]
    pub trans_type: i64,
    #[serde(rename = "TransContent", default)]
    pub trans_content: i64,
    #[serde(rename = "TransactionAmount", default)]
    pub transaction_amount: f64,
    #[serde(rename = "DealType_Sum", default)]
    pub deal_type_sum: i64,
    #[serde(rename = "BalanceAmount", default)]
    pub balance_amount: f64,
    #[serde(rename = "PayNumber", default)]
    pub pay_number: String,
    #[serde(rename = "PaywayID", default)]
    pub payway_id: String,
}

/// 充值交易的 TransType 取值
pub const TRANS_TYPE_DEPOSIT: i64 = 1;

impl TransactionRecord {
    /// 是否为一笔成功充值
    pub fn is_deposit(&self) -> bool {
        self.trans_type == TRANS_TYPE_DEPOSIT && self.transaction_amount > 0.0
    }
}

/// 最近一笔充值的摘要
#[derive(Debug, Clone, PartialEq)]
pub struct DepositInfo {
    pub amount: f64,
    /// 已折算到 UTC+7 的时间串
    pub time: String,
    pub tx_code: String,
}

impl TransactionHistoryResponse {
    /// 在返回的第一页交易中选出时间最新的一笔充值
    ///
    /// 时间折算到胡志明时区后按字典序比较（折算后的格式保证
    /// 字典序即时间序），严格更新才替换，并列保留先遇到的一笔。
    pub fn latest_deposit(&self) -> Option<DepositInfo> {
        let mut latest: Option<DepositInfo> = None;
        for record in &self.data.records {
            if !record.is_deposit() {
                continue;
            }
            let hcm_time = to_hcm_time(&record.create_time);
            let newer = match &latest {
                None => true,
                Some(current) => current.time < hcm_time,
            };
            if newer {
                latest = Some(DepositInfo {
                    amount: record.transaction_amount,
                    time: hcm_time,
                    tx_code: record.transaction_number.clone(),
                });
            }
        }
        latest
    }
}

/// 把服务端的 UTC 时间串折算到胡志明时区（UTC+7）
///
/// 输入形如 `2025-03-22T18:06:49.18`（小数秒可缺省），
/// 输出 `2025-03-23 01:06:49`；无法解析时原样返回。
pub fn to_hcm_time(utc_time: &str) -> String {
    match NaiveDateTime::parse_from_str(utc_time, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(t) => (t + chrono::Duration::hours(7)).format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => utc_time.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prefers_error_body() {
        // 错误体与账号标识同时存在时，错误体优先
        let raw = r#"{
            "Data": {"AccountID": "u1", "CookieID": "c1", "IsSuccess": true},
            "Error": {"Code": 1005, "Message": "密码错误"}
        }"#;
        let outcome = LoginOutcome::classify(raw).expect("应能解析");
        assert_eq!(
            outcome,
            LoginOutcome::Rejected {
                code: 1005,
                message: "密码错误".to_string()
            }
        );
    }

    #[test]
    fn test_classify_legacy_rejection() {
        let raw = r#"{"Data": {"IsSuccess": false, "Message": "账号已锁定"}}"#;
        let outcome = LoginOutcome::classify(raw).expect("应能解析");
        assert_eq!(
            outcome,
            LoginOutcome::LegacyRejected {
                message: "账号已锁定".to_string()
            }
        );
    }

    #[test]
    fn test_classify_missing_identity() {
        let raw = r#"{"Data": {"IsSuccess": true, "AccountID": "u1"}}"#;
        let outcome = LoginOutcome::classify(raw).expect("应能解析");
        assert_eq!(outcome, LoginOutcome::MissingIdentity);
    }

    #[test]
    fn test_classify_established() {
        let raw = r#"{
            "Status": 1,
            "Data": {"AccountID": "u1", "CookieID": "abc", "NickName": "小王", "IsSuccess": true}
        }"#;
        let outcome = LoginOutcome::classify(raw).expect("应能解析");
        assert_eq!(
            outcome,
            LoginOutcome::Established {
                account_id: "u1".to_string(),
                cookie_id: "abc".to_string(),
                nick_name: "小王".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_bad_json() {
        assert!(LoginOutcome::classify("not-json").is_err());
    }

    #[test]
    fn test_idy_key_empty_means_failed() {
        let ok: CaptchaVerifyResponse =
            serde_json::from_str(r#"{"Data": {"Message": "KEY-1"}}"#).expect("应能解析");
        assert_eq!(ok.idy_key(), Some("KEY-1"));

        let failed: CaptchaVerifyResponse =
            serde_json::from_str(r#"{"Data": {"Message": ""}}"#).expect("应能解析");
        assert_eq!(failed.idy_key(), None);
    }

    #[test]
    fn test_balance_two_shapes() {
        let flat: BalanceResponse =
            serde_json::from_str(r#"{"Data": {"BalanceAmount": 120.5}}"#).expect("应能解析");
        assert_eq!(flat.amount(), 120.5);

        let nested: BalanceResponse =
            serde_json::from_str(r#"{"Data": {"WalletData": {"BalanceAmount": 88.0}}}"#)
                .expect("应能解析");
        assert_eq!(nested.amount(), 88.0);
    }

    #[test]
    fn test_to_hcm_time_adds_seven_hours() {
        assert_eq!(to_hcm_time("2025-03-22T18:06:49.18"), "2025-03-23 01:06:49");
        assert_eq!(to_hcm_time("2025-03-22T18:06:49"), "2025-03-23 01:06:49");
        // 无法解析的输入原样返回
        assert_eq!(to_hcm_time("昨天"), "昨天");
    }

    #[test]
    fn test_latest_deposit_picks_newest() {
        let raw = r#"{
            "Data": {
                "Data": [
                    {"TransactionNumber": "T1", "CreateTime": "2025-03-20T10:00:00", "TransType": 1, "TransactionAmount": 100.0},
                    {"TransactionNumber": "T2", "CreateTime": "2025-03-22T09:30:00", "TransType": 2, "TransactionAmount": 500.0},
                    {"TransactionNumber": "T3", "CreateTime": "2025-03-21T08:00:00", "TransType": 1, "TransactionAmount": 250.0}
                ],
                "Pager": {"TotalItemCount": 3}
            }
        }"#;
        let history: TransactionHistoryResponse = serde_json::from_str(raw).expect("应能解析");
        let deposit = history.latest_deposit().expect("应找到充值记录");
        // T2 不是充值，在 T1 与 T3 中取时间较新的 T3
        assert_eq!(deposit.tx_code, "T3");
        assert_eq!(deposit.amount, 250.0);
        assert_eq!(deposit.time, "2025-03-21 15:00:00");
    }

    #[test]
    fn test_latest_deposit_tie_keeps_first() {
        let raw = r#"{
            "Data": {
                "Data": [
                    {"TransactionNumber": "T1", "CreateTime": "2025-03-20T10:00:00", "TransType": 1, "TransactionAmount": 100.0},
                    {"TransactionNumber": "T2", "CreateTime": "2025-03-20T10:00:00", "TransType": 1, "TransactionAmount": 200.0}
                ]
            }
        }"#;
        let history: TransactionHistoryResponse = serde_json::from_str(raw).expect("应能解析");
        let deposit = history.latest_deposit().expect("应找到充值记录");
        assert_eq!(deposit.tx_code, "T1");
    }

    #[test]
    fn test_latest_deposit_filters_amount() {
        // 金额为 0 的 TransType=1 记录不算充值
        let raw = r#"{
            "Data": {
                "Data": [
                    {"TransactionNumber": "T1", "CreateTime": "2025-03-20T10:00:00", "TransType": 1, "TransactionAmount": 0.0}
                ]
            }
        }"#;
        let history: TransactionHistoryResponse = serde_json::from_str(raw).expect("应能解析");
        assert!(history.latest_deposit().is_none());
    }
}
