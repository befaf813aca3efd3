//! # Autologin
//!
//! 一个用于批量账号登录和余额采集的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有共享资源，只暴露能力
//! - `ProxyPool` - 持有代理列表，提供轮询取用能力
//! - `CaptchaSolver` - 持有求解器子进程，提供滑块求解能力
//!
//! ### ② 业务能力层（Clients / Services）
//! - `clients/` - 单个账号的站点 HTTP 客户端（token / Cookie 状态机）
//! - `services/` - 账号台账（计数 + 对账）与结果文件写入
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个账号"的完整处理流程
//! - `AccountCtx` - 上下文封装（account + row_index）
//! - `LoginFlow` - 流程编排（落地页 → 验证码 → 登录 → 查询）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量账号处理器，管理资源和并发
//! - `orchestrator/account_processor` - 单个账号任务包装，崩溃隔离
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::SiteClient;
pub use config::Config;
pub use error::{ClientError, SolverError};
pub use infrastructure::{CaptchaSolver, ProxyPool};
pub use models::{Account, AccountResult};
pub use orchestrator::{App, BatchSummary};
pub use workflow::{AccountCtx, LoginFlow};
