//! 滑块验证码求解 - 基础设施层
//!
//! 封装外部 captcha_solver 程序的两种调用方式：常驻 socket 服务和
//! 一次性 pipe 子进程。服务一旦连不上就降级为 pipe 模式并保持，
//! 后续请求不再反复探测服务。

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::SolverError;

/// 服务拉起后的就绪探测次数，每次间隔 1 秒
const READY_PROBES: usize = 10;

/// 验证码数据里必须携带的图片字段
#[derive(Debug, Deserialize)]
struct CaptchaPayload {
    #[serde(rename = "Data", default)]
    data: CaptchaImages,
}

#[derive(Debug, Default, Deserialize)]
struct CaptchaImages {
    #[serde(rename = "Slider", default)]
    slider: String,
    #[serde(rename = "Background", default)]
    background: String,
}

/// 求解器的 JSON 输出形式
#[derive(Debug, Deserialize)]
struct SolverReply {
    x: i64,
}

/// 滑块验证码求解器
///
/// 职责：
/// - 持有 captcha_solver 服务子进程
/// - 暴露"给定验证码 JSON，求滑块 X 坐标"的能力
/// - 不认识账号和登录流程
pub struct CaptchaSolver {
    solver_path: String,
    service_addr: String,
    service_port: u16,
    /// 服务不可用标记，置位后一直走 pipe 模式
    service_down: AtomicBool,
    service_child: Mutex<Option<Child>>,
}

impl CaptchaSolver {
    pub fn new(config: &Config) -> Self {
        Self {
            solver_path: config.solver_path.clone(),
            service_addr: "127.0.0.1".to_string(),
            service_port: config.solver_port,
            service_down: AtomicBool::new(false),
            service_child: Mutex::new(None),
        }
    }

    /// 构造只使用 pipe 模式的求解器，交互模式和调试场景用
    pub fn pipe_only(config: &Config) -> Self {
        let solver = Self::new(config);
        solver.service_down.store(true, Ordering::Relaxed);
        solver
    }

    /// 是否已降级为 pipe 模式
    pub fn pipe_mode(&self) -> bool {
        self.service_down.load(Ordering::Relaxed)
    }

    /// 启动常驻求解服务
    ///
    /// 端口上已有服务在监听时直接复用；否则拉起子进程并轮询端口
    /// 直到可连接。失败时置位降级标记并返回错误。
    pub async fn start_service(&self) -> Result<(), SolverError> {
        let mut child_guard = self.service_child.lock().await;

        // 子进程还活着就不重复拉起
        if let Some(child) = child_guard.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                return Ok(());
            }
            *child_guard = None;
        }

        if self.service_reachable(Duration::from_secs(1)).await {
            info!(port = self.service_port, "验证码服务已在运行，直接复用");
            return Ok(());
        }

        info!(port = self.service_port, "🚀 启动验证码求解服务...");
        let child = Command::new(&self.solver_path)
            .args(["--service", "--port", &self.service_port.to_string()])
            .spawn()
            .map_err(|source| {
                self.service_down.store(true, Ordering::Relaxed);
                SolverError::Spawn { source }
            })?;
        *child_guard = Some(child);

        for attempt in 1..=READY_PROBES {
            if self.service_reachable(Duration::from_secs(1)).await {
                info!(port = self.service_port, "✅ 验证码服务已就绪");
                return Ok(());
            }
            info!("等待验证码服务就绪 ({}/{})...", attempt, READY_PROBES);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        self.service_down.store(true, Ordering::Relaxed);
        Err(SolverError::ServiceNotReady {
            attempts: READY_PROBES,
        })
    }

    /// 停止常驻求解服务
    pub async fn stop_service(&self) {
        let mut child_guard = self.service_child.lock().await;
        if let Some(mut child) = child_guard.take() {
            info!("停止验证码服务...");
            if let Err(err) = child.start_kill() {
                warn!(error = %err, "停止验证码服务失败");
            }
        }
    }

    /// 求解滑块验证码，返回缺口的 X 坐标
    ///
    /// # 参数
    /// - `captcha_json`: 验证码接口返回的原始 JSON
    pub async fn solve(&self, captcha_json: &str) -> Result<i64, SolverError> {
        validate_payload(captcha_json)?;

        if self.pipe_mode() {
            return self.solve_pipe(captcha_json).await;
        }

        match self.solve_socket(captcha_json).await {
            Ok(x) => Ok(x),
            Err(err) => {
                self.service_down.store(true, Ordering::Relaxed);
                warn!(error = %err, "⚠️ 无法使用验证码服务，改用 pipe 模式");
                self.solve_pipe(captcha_json).await
            }
        }
    }

    /// 通过 socket 连接常驻服务求解
    async fn solve_socket(&self, captcha_json: &str) -> Result<i64, SolverError> {
        let addr = format!("{}:{}", self.service_addr, self.service_port);
        let stream = tokio::time::timeout(Duration::from_secs(3), TcpStream::connect(&addr))
            .await
            .map_err(|_| SolverError::ServiceUnreachable {
                source: std::io::Error::new(std::io::ErrorKind::TimedOut, "连接超时"),
            })?
            .map_err(|source| SolverError::ServiceUnreachable { source })?;

        let mut stream = stream;
        stream
            .write_all(format!("{}\n", captcha_json).as_bytes())
            .await
            .map_err(|source| SolverError::ServiceUnreachable { source })?;

        let mut buf = vec![0u8; 1024];
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|source| SolverError::ServiceUnreachable { source })?;

        let reply = String::from_utf8_lossy(&buf[..n]);
        parse_reply(reply.trim())
    }

    /// 以一次性子进程方式求解，JSON 走 stdin，结果走 stdout
    async fn solve_pipe(&self, captcha_json: &str) -> Result<i64, SolverError> {
        let mut child = Command::new(&self.solver_path)
            .arg("--pipe")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| SolverError::Spawn { source })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(captcha_json.as_bytes())
                .await
                .map_err(|source| SolverError::PipeFailed {
                    detail: format!("写入 stdin 失败: {}", source),
                })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| SolverError::PipeFailed {
                detail: format!("等待子进程失败: {}", source),
            })?;

        if !output.status.success() {
            return Err(SolverError::PipeFailed {
                detail: format!("退出状态 {}", output.status),
            });
        }

        let reply = String::from_utf8_lossy(&output.stdout);
        parse_reply(reply.trim())
    }

    async fn service_reachable(&self, timeout: Duration) -> bool {
        let addr = format!("{}:{}", self.service_addr, self.service_port);
        matches!(
            tokio::time::timeout(timeout, TcpStream::connect(&addr)).await,
            Ok(Ok(_))
        )
    }
}

/// 校验验证码数据完整性，滑块图和背景图缺一不可
fn validate_payload(captcha_json: &str) -> Result<(), SolverError> {
    let payload: CaptchaPayload =
        serde_json::from_str(captcha_json).map_err(|source| SolverError::InvalidJson { source })?;

    if payload.data.slider.is_empty() || payload.data.background.is_empty() {
        return Err(SolverError::InvalidPayload);
    }
    Ok(())
}

/// 解析求解器输出，兼容 `{"x": N}` 和纯数字两种形式
fn parse_reply(raw: &str) -> Result<i64, SolverError> {
    if raw.starts_with('{') {
        let reply: SolverReply =
            serde_json::from_str(raw).map_err(|_| SolverError::MalformedOutput {
                raw: raw.to_string(),
            })?;
        return Ok(reply.x);
    }

    raw.parse::<i64>().map_err(|_| SolverError::MalformedOutput {
        raw: raw.to_string(),
    })
}
