//! 结果文件写入 - 业务能力层
//!
//! 成功与失败账号分别落到 results 目录下两个带时间戳的 CSV 文件，
//! 成功文件带余额和充值信息列，失败文件只有凭据列，原始表格里的
//! 附加列原样透传到两边

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};

use crate::models::AccountResult;

/// 结果写入器
///
/// 职责：
/// - 创建本次运行的成功 / 失败结果文件并写表头
/// - 按处理完成顺序逐行追加结果
/// - 不认识处理流程，只认识 AccountResult
pub struct ResultWriter {
    success_path: PathBuf,
    fail_path: PathBuf,
    inner: Mutex<Sinks>,
}

struct Sinks {
    success: csv::Writer<File>,
    failure: csv::Writer<File>,
}

impl ResultWriter {
    /// 在结果目录下创建本次运行的两个结果文件
    ///
    /// # 参数
    /// - `results_dir`: 输出目录，不存在时自动创建
    /// - `extra_count`: 输入表格携带的附加列数，决定表头里的 Extra 列
    pub fn create(results_dir: &Path, extra_count: usize) -> Result<Self> {
        std::fs::create_dir_all(results_dir)
            .with_context(|| format!("无法创建结果目录: {}", results_dir.display()))?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let success_path = results_dir.join(format!("success_{}.csv", timestamp));
        let fail_path = results_dir.join(format!("fail_{}.csv", timestamp));

        let mut success = csv::Writer::from_path(&success_path)
            .with_context(|| format!("无法创建成功结果文件: {}", success_path.display()))?;
        let mut failure = csv::Writer::from_path(&fail_path)
            .with_context(|| format!("无法创建失败结果文件: {}", fail_path.display()))?;

        let mut success_headers = vec![
            "Username".to_string(),
            "Password".to_string(),
            "Balance".to_string(),
            "LastDeposit".to_string(),
            "DepositTime".to_string(),
            "DepositTxCode".to_string(),
        ];
        let mut fail_headers = vec!["Username".to_string(), "Password".to_string()];
        for i in 1..=extra_count {
            success_headers.push(format!("Extra{}", i));
            fail_headers.push(format!("Extra{}", i));
        }

        success
            .write_record(&success_headers)
            .context("写入成功文件表头失败")?;
        failure
            .write_record(&fail_headers)
            .context("写入失败文件表头失败")?;

        Ok(Self {
            success_path,
            fail_path,
            inner: Mutex::new(Sinks { success, failure }),
        })
    }

    /// 追加一条处理结果到对应文件
    pub fn append(&self, result: &AccountResult) -> Result<()> {
        let mut sinks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if result.success {
            let mut record = vec![
                result.username.clone(),
                result.password.clone(),
                format!("{:.2}", result.balance),
                format!("{:.2}", result.last_deposit),
                result.deposit_time.clone(),
                result.deposit_tx_code.clone(),
            ];
            record.extend(result.extra.iter().cloned());
            sinks
                .success
                .write_record(&record)
                .context("写入成功结果行失败")?;
        } else {
            let mut record = vec![result.username.clone(), result.password.clone()];
            record.extend(result.extra.iter().cloned());
            sinks
                .failure
                .write_record(&record)
                .context("写入失败结果行失败")?;
        }

        Ok(())
    }

    /// 把缓冲内容落盘
    pub fn flush(&self) -> Result<()> {
        let mut sinks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        sinks.success.flush().context("成功结果文件落盘失败")?;
        sinks.failure.flush().context("失败结果文件落盘失败")?;
        Ok(())
    }

    pub fn success_path(&self) -> &Path {
        &self.success_path
    }

    pub fn fail_path(&self) -> &Path {
        &self.fail_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Account;

    fn sample_account() -> Account {
        Account::new("user1", "pass1", vec!["渠道A".to_string(), "备注".to_string()])
    }

    #[test]
    fn test_writes_success_and_failure_rows() {
        let dir = tempfile::tempdir().expect("临时目录");
        let writer = ResultWriter::create(dir.path(), 2).expect("创建写入器");

        let account = sample_account();
        let mut success = AccountResult::success(&account);
        success.balance = 1234.5;
        success.last_deposit = 200.0;
        success.deposit_time = "2025-03-23 01:06:49".to_string();
        success.deposit_tx_code = "TX001".to_string();

        let failure_account = Account::new("user2", "pass2", vec!["x".to_string(), "y".to_string()]);
        let failure = AccountResult::failure(&failure_account);

        writer.append(&success).expect("写入成功行");
        writer.append(&failure).expect("写入失败行");
        writer.flush().expect("落盘");

        let success_content =
            std::fs::read_to_string(writer.success_path()).expect("读取成功文件");
        let mut lines = success_content.lines();
        assert_eq!(
            lines.next(),
            Some("Username,Password,Balance,LastDeposit,DepositTime,DepositTxCode,Extra1,Extra2")
        );
        assert_eq!(
            lines.next(),
            Some("user1,pass1,1234.50,200.00,2025-03-23 01:06:49,TX001,渠道A,备注")
        );

        let fail_content = std::fs::read_to_string(writer.fail_path()).expect("读取失败文件");
        let mut lines = fail_content.lines();
        assert_eq!(lines.next(), Some("Username,Password,Extra1,Extra2"));
        assert_eq!(lines.next(), Some("user2,pass2,x,y"));
    }

    #[test]
    fn test_no_extra_columns() {
        let dir = tempfile::tempdir().expect("临时目录");
        let writer = ResultWriter::create(dir.path(), 0).expect("创建写入器");
        writer.flush().expect("落盘");

        let fail_content = std::fs::read_to_string(writer.fail_path()).expect("读取失败文件");
        assert_eq!(fail_content.lines().next(), Some("Username,Password"));
    }

    #[test]
    fn test_creates_results_dir() {
        let dir = tempfile::tempdir().expect("临时目录");
        let nested = dir.path().join("results");
        let writer = ResultWriter::create(&nested, 0).expect("创建写入器");
        assert!(nested.is_dir());
        assert!(writer.success_path().starts_with(&nested));
    }
}
