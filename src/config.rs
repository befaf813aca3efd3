/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 目标站点根地址
    pub base_url: String,
    /// 登录接口完整地址
    pub login_url: String,
    /// 同时处理的账号数量
    pub max_workers: usize,
    /// 验证码求解器可执行文件路径
    pub solver_path: String,
    /// 验证码服务监听端口
    pub solver_port: u16,
    /// 滑块验证码最大尝试轮数
    pub max_captcha_attempts: usize,
    /// 代理列表文件
    pub proxy_file: String,
    /// 结果文件输出目录
    pub results_dir: String,
    /// 单个请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://www.efch872.net".to_string(),
            login_url: "https://www.efch872.net/api/Authorize/EntryPoint88".to_string(),
            max_workers: 1,
            solver_path: "./captcha_solver".to_string(),
            solver_port: 9876,
            max_captcha_attempts: 60,
            proxy_file: "proxy.txt".to_string(),
            results_dir: "results".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            base_url: std::env::var("BASE_URL").unwrap_or(default.base_url),
            login_url: std::env::var("LOGIN_URL").unwrap_or(default.login_url),
            max_workers: std::env::var("MAX_WORKERS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_workers),
            solver_path: std::env::var("SOLVER_PATH").unwrap_or(default.solver_path),
            solver_port: std::env::var("SOLVER_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.solver_port),
            max_captcha_attempts: std::env::var("MAX_CAPTCHA_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_captcha_attempts),
            proxy_file: std::env::var("PROXY_FILE").unwrap_or(default.proxy_file),
            results_dir: std::env::var("RESULTS_DIR").unwrap_or(default.results_dir),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
        }
    }
}
