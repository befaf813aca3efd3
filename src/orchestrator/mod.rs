//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量调度和资源管理，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量账号处理器
//! - 管理应用生命周期（初始化、运行、收尾）
//! - 读取账号表格（Vec<Account>）
//! - 控制并发数量（Semaphore）
//! - 管理共享资源（代理池、求解器、台账）
//! - 输出全局统计并运行对账
//!
//! ### `account_processor` - 单个账号任务包装
//! - 标记台账的处理中/成功/失败状态
//! - 把任务内的 panic 折算成失败结果
//! - 保证每个账号恰好投递一条结果
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Account>)
//!     ↓
//! account_processor (包装单个账号任务)
//!     ↓
//! workflow::LoginFlow (处理单个 Account)
//!     ↓
//! clients / services (能力层：站点客户端 / 台账 / 结果写入)
//!     ↓
//! infrastructure (基础设施：代理池 / 验证码求解器)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管批量，account_processor 管单个边界
//! 2. **资源隔离**：只有编排层构造共享资源，向下只传 Arc 句柄
//! 3. **向下依赖**：编排层 → workflow → clients/services → infrastructure
//! 4. **无业务逻辑**：只做调度、统计和对账，不做具体业务判断

pub mod account_processor;
pub mod batch_processor;

// 重新导出主要类型
pub use account_processor::run_guarded;
pub use batch_processor::{App, BatchSummary};
