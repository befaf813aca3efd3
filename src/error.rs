//! 应用错误类型定义
//!
//! 站点客户端与验证码求解器各自有一个带分类信息的错误枚举，
//! 其余路径直接使用 `anyhow::Result` 向上传递。

use thiserror::Error;

/// 站点客户端错误
///
/// `is_transient` 用于区分可通过换代理重试的网络错误和
/// 必须终止当前账号的业务错误。
#[derive(Debug, Error)]
pub enum ClientError {
    /// 请求发送失败（超时、连接被拒等）
    #[error("请求 {endpoint} 失败: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// 服务端返回非 200 状态码
    #[error("{endpoint} 返回异常状态码: {status}")]
    BadStatus { endpoint: String, status: u16 },

    /// 403，会话 Cookie 无效或已过期
    #[error("{endpoint} 返回 403，Cookie 无效或已过期")]
    Forbidden { endpoint: String },

    /// 首页中未找到防伪 token，页面结构异常（被封 IP、维护页等）
    #[error("首页未找到防伪 token")]
    TokenMissing,
}

impl ClientError {
    /// 是否属于可换代理重试的瞬时网络错误
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Request { source, .. } => source.is_timeout() || source.is_connect(),
            _ => false,
        }
    }
}

/// 验证码求解器错误
#[derive(Debug, Error)]
pub enum SolverError {
    /// 验证码数据缺少滑块或背景图
    #[error("验证码数据不完整: 缺少滑块或背景图")]
    InvalidPayload,

    /// 验证码数据不是合法 JSON
    #[error("验证码数据不是合法 JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    /// 无法连接验证码服务
    #[error("无法连接验证码服务: {source}")]
    ServiceUnreachable {
        #[source]
        source: std::io::Error,
    },

    /// 服务进程已拉起但在限定次数内未就绪
    #[error("验证码服务在 {attempts} 次探测后仍未就绪")]
    ServiceNotReady { attempts: usize },

    /// 求解器子进程无法启动
    #[error("无法启动验证码求解器: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },

    /// 求解器子进程异常退出
    #[error("验证码求解器异常退出: {detail}")]
    PipeFailed { detail: String },

    /// 求解器输出既不是 x 坐标 JSON 也不是纯数字
    #[error("求解结果无法解析: {raw}")]
    MalformedOutput { raw: String },
}
