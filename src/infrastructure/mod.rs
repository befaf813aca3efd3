pub mod captcha_solver;
pub mod proxy_pool;

pub use captcha_solver::CaptchaSolver;
pub use proxy_pool::{format_proxy_url, ProxyPool};
