use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::models::account::Account;

/// 从 CSV 表格加载账号列表
///
/// 第一行是表头，直接丢弃；每行第 2 列为账号、第 3 列为密码，
/// 第 4 列起为透传字段。列数不足三列或账号/密码为空的行跳过，
/// 不计入失败。
pub async fn load_account_sheet(path: &Path) -> Result<Vec<Account>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取账号表格: {}", path.display()))?;
    parse_account_rows(&content)
}

fn parse_account_rows(content: &str) -> Result<Vec<Account>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut accounts = Vec::new();
    for record in reader.records() {
        let record = record.context("解析表格行失败")?;
        if record.len() < 3 {
            warn!("跳过列数不足的行");
            continue;
        }

        let username = record.get(1).unwrap_or("").trim();
        let password = record.get(2).unwrap_or("").trim();
        if username.is_empty() || password.is_empty() {
            info!(username, "跳过账号或密码为空的行");
            continue;
        }

        let extra: Vec<String> = record.iter().skip(3).map(|s| s.to_string()).collect();
        accounts.push(Account::new(username, password, extra));
    }

    Ok(accounts)
}
