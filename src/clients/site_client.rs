/// 登录站点 API 客户端
///
/// 封装落地页抓取、滑块验证码接口、登录握手和登录后各查询接口的
/// 全部 HTTP 调用，并维护跨请求的 token 与 Cookie 状态
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::error::ClientError;
use crate::utils::{scrape, session};

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_JSON: &str = "application/json, text/plain, */*";
const ACCEPT_LANGUAGE: &str = "vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7";

/// 站点客户端
///
/// 每个账号独立持有一个实例，内部状态（token、Cookie、指纹）随
/// 各请求逐步建立，不做自动 Cookie 管理，全部手工拼装
pub struct SiteClient {
    http: Client,
    base_url: String,
    login_url: String,
    username: String,
    password: String,
    user_agent: String,
    finger_idx: String,
    token: String,
    idy_key: String,
    /// 落地页里的会话 cookie 值（IT 优先，缺失时 BBOSID）
    session_cookie: String,
    /// 发请求用的完整 Cookie 头
    cookie_header: String,
    /// 最近一次响应的原始 Set-Cookie 内容，按行拼接
    raw_cookies: String,
}

impl SiteClient {
    /// 创建站点客户端
    ///
    /// # 参数
    /// - `config`: 全局配置
    /// - `username` / `password`: 账号凭据
    /// - `proxy_url`: 代理地址，None 表示直连
    pub fn new(
        config: &Config,
        username: &str,
        password: &str,
        proxy_url: Option<&str>,
    ) -> Result<Self> {
        let user_agent = session::random_user_agent().to_string();

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(user_agent.clone());
        if let Some(url) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(url).context("代理地址无效")?);
        }
        let http = builder.build().context("构建 HTTP 客户端失败")?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            login_url: config.login_url.clone(),
            username: username.to_string(),
            password: password.to_string(),
            user_agent,
            finger_idx: session::finger_idx(),
            token: String::new(),
            idy_key: String::new(),
            session_cookie: String::new(),
            cookie_header: String::new(),
            raw_cookies: String::new(),
        })
    }

    /// 抓取落地页，建立 token、Cookie 和指纹等初始状态
    ///
    /// 落地页没有防伪 token 视为致命错误；IdyKey 和会话 cookie
    /// 可以缺失
    pub async fn fetch_initial_data(&mut self) -> Result<(), ClientError> {
        let url = format!("{}/Home/Index", self.base_url);
        let resp = self
            .http
            .get(&url)
            .header("Accept", ACCEPT_HTML)
            .send()
            .await
            .map_err(|source| request_error("HomeIndex", source))?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(ClientError::BadStatus {
                endpoint: "HomeIndex".to_string(),
                status,
            });
        }

        self.raw_cookies = collect_set_cookies(resp.headers());
        let html = resp
            .text()
            .await
            .map_err(|source| request_error("HomeIndex", source))?;

        self.token = scrape::extract_token(&html).ok_or(ClientError::TokenMissing)?;
        self.idy_key = scrape::extract_idy_key(&html).unwrap_or_default();
        self.session_cookie = scrape::extract_session_cookie(&self.raw_cookies).unwrap_or_default();
        self.cookie_header = scrape::assemble_cookie_header(&self.raw_cookies);
        self.finger_idx = session::finger_idx();

        Ok(())
    }

    /// 获取滑块验证码图片数据，返回原始 JSON
    pub async fn get_slider_captcha(&self) -> Result<String, ClientError> {
        let url = format!("{}/api/Verify/GetSliderCaptcha", self.base_url);
        let resp = self
            .api_post(&url, "/Home/Index")
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|source| request_error("GetSliderCaptcha", source))?;

        read_ok_body("GetSliderCaptcha", resp).await
    }

    /// 提交滑块求解结果进行校验
    ///
    /// 服务端要求整条拖动轨迹而不是单个坐标，这里按求出的 X 坐标
    /// 构造一条匀速轨迹
    pub async fn check_slider_captcha(&self, x: i64) -> Result<String, ClientError> {
        let url = format!("{}/api/Verify/CheckSliderCaptcha", self.base_url);
        let resp = self
            .api_post(&url, "/Home/Index")
            .header("Content-Type", "application/json;charset=UTF-8")
            .json(&json!({ "Trail": build_trail(x) }))
            .send()
            .await
            .map_err(|source| request_error("CheckSliderCaptcha", source))?;

        read_ok_body("CheckSliderCaptcha", resp).await
    }

    /// 执行登录握手，返回原始响应 JSON
    ///
    /// 无论业务成败都更新 Cookie 状态：吸收响应里的 Set-Cookie，
    /// 并用返回的 CookieID 合成 BBOSID / BBOAUTH / CookieID 三个
    /// 会话 cookie。响应体的业务判定交给调用方
    pub async fn login(&mut self) -> Result<String, ClientError> {
        let body = json!({
            "AccountID": self.username,
            "AccountPWD": session::encode_password(&self.password),
            "ProtectCode": "",
            "LocalStorgeCookie": self.session_cookie,
            "FingerIDX": self.finger_idx,
            "ScreenResolution": "1920*1080",
            "ShowSliderCaptcha": true,
            "ShowPhoneVerify": false,
            "VerifySliderCaptcha": true,
            "CellPhone": "",
            "ProtectCodeCellPhone": "",
            "IsCellPhoneValid": false,
            "IdyKey": self.idy_key,
            "CaptchaCode": "",
            "LoginVerification": 1,
            "IsLobbyProtect": false,
            "UniqueSessionId": format!("TM{}", session::timestamp_millis()),
        });

        let url = self.login_url.clone();
        let resp = self
            .api_post(&url, "/Home/Index")
            .header("Content-Type", "application/json;charset=UTF-8")
            .json(&body)
            .send()
            .await
            .map_err(|source| request_error("Login", source))?;

        self.raw_cookies = collect_set_cookies(resp.headers());
        if !self.raw_cookies.is_empty() {
            self.cookie_header = scrape::assemble_cookie_header(&self.raw_cookies);
        }

        let body_text = resp
            .text()
            .await
            .map_err(|source| request_error("Login", source))?;
        self.absorb_login_identity(&body_text);

        Ok(body_text)
    }

    /// 登录成功后重新抓取首页，刷新 token 并接收新 Cookie
    ///
    /// 刷新可能丢掉登录合成的 BBOSID / BBOAUTH，丢了要补回来，
    /// 否则后续查询接口会拿到 403
    pub async fn fetch_home_after_login(&mut self) -> Result<(), ClientError> {
        let original_bbosid =
            scrape::extract_cookie_value(&self.cookie_header, "BBOSID").unwrap_or_default();
        let original_bboauth =
            scrape::extract_cookie_value(&self.cookie_header, "BBOAUTH").unwrap_or_default();

        let url = format!("{}/Home/Index", self.base_url);
        let resp = self
            .http
            .get(&url)
            .header("Accept", ACCEPT_HTML)
            .header("Cookie", &self.cookie_header)
            .send()
            .await
            .map_err(|source| request_error("HomeIndexAfterLogin", source))?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(ClientError::BadStatus {
                endpoint: "HomeIndexAfterLogin".to_string(),
                status,
            });
        }

        self.raw_cookies = collect_set_cookies(resp.headers());
        let html = resp
            .text()
            .await
            .map_err(|source| request_error("HomeIndexAfterLogin", source))?;

        if let Some(new_token) = scrape::extract_token(&html) {
            self.token = new_token;
        }

        let mut refreshed = scrape::assemble_cookie_header(&self.raw_cookies);
        if !refreshed.contains("BBOSID=") && !original_bbosid.is_empty() {
            if !refreshed.is_empty() {
                refreshed.push_str("; ");
            }
            refreshed.push_str(&format!("BBOSID={}", original_bbosid));
        }
        if !refreshed.contains("BBOAUTH=") && !original_bboauth.is_empty() {
            if !refreshed.is_empty() {
                refreshed.push_str("; ");
            }
            refreshed.push_str(&format!("BBOAUTH={}", original_bboauth));
        }
        self.cookie_header = refreshed;

        Ok(())
    }

    /// 查询账号余额，返回原始 JSON
    ///
    /// 请求发送失败时隔 1 秒重试一次；403 说明会话 Cookie 已失效
    pub async fn get_member_balance(&self) -> Result<String, ClientError> {
        let url = format!(
            "{}/api/MemberTransfer/GetMemberBalanceInfoByAccountID",
            self.base_url
        );

        // 空对象 body 避免 411 Length Required
        let resp = match self
            .member_api_post(&url, "/Home/Index")
            .body("{}")
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(first_err) => {
                debug!(error = %first_err, "余额查询请求失败，1 秒后重试");
                tokio::time::sleep(Duration::from_secs(1)).await;
                self.member_api_post(&url, "/Home/Index")
                    .body("{}")
                    .send()
                    .await
                    .map_err(|source| request_error("GetMemberBalance", source))?
            }
        };

        read_ok_body("GetMemberBalance", resp).await
    }

    /// 查询交易记录功能是否对该账号开放
    pub async fn check_transaction_access(&self) -> Result<String, ClientError> {
        let url = format!(
            "{}/api/Common/GetTransactionRecordUploadSetting",
            self.base_url
        );
        let resp = self
            .member_api_post(&url, "/Member/TransactionRecords")
            .send()
            .await
            .map_err(|source| request_error("CheckTransactionAccess", source))?;

        read_ok_body("CheckTransactionAccess", resp).await
    }

    /// 拉取第一页交易记录，按创建时间倒序
    pub async fn get_transaction_history(&self) -> Result<String, ClientError> {
        let url = format!(
            "{}/api/TransactionRecords/GetMemberWalletSumLogByCondition",
            self.base_url
        );
        let body = json!({
            "TransType": 0,
            "QueryType": 1,
            "PageNumber": 0,
            "RecordCounts": 10,
            "OrderField": "CreateTime",
            "Desc": "true",
        });
        let resp = self
            .member_api_post(&url, "/Member/TransactionRecords")
            .json(&body)
            .send()
            .await
            .map_err(|source| request_error("GetTransactionHistory", source))?;

        read_ok_body("GetTransactionHistory", resp).await
    }

    /// 设置验证码校验得到的 IdyKey
    pub fn set_idy_key(&mut self, idy_key: impl Into<String>) {
        self.idy_key = idy_key.into();
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn idy_key(&self) -> &str {
        &self.idy_key
    }

    pub fn session_cookie(&self) -> &str {
        &self.session_cookie
    }

    pub fn cookie_header(&self) -> &str {
        &self.cookie_header
    }

    pub fn raw_cookies(&self) -> &str {
        &self.raw_cookies
    }

    pub fn finger_idx(&self) -> &str {
        &self.finger_idx
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// API POST 请求的公共头：防伪 token、referer、origin 和时间戳
    fn api_post(&self, url: &str, referer_path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(url)
            .header("requestverificationtoken", &self.token)
            .header("referer", format!("{}{}", self.base_url, referer_path))
            .header("origin", &self.base_url)
            .header("x-requested-with", "XMLHttpRequest")
            .header("uniquetick", session::timestamp_millis())
    }

    /// 登录后查询接口的公共头，在 api_post 基础上带 accept 组和 Cookie
    fn member_api_post(&self, url: &str, referer_path: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .api_post(url, referer_path)
            .header("Content-Type", "application/json;charset=UTF-8")
            .header("accept", ACCEPT_JSON)
            .header("accept-language", ACCEPT_LANGUAGE);
        if !self.cookie_header.is_empty() {
            req = req.header("Cookie", &self.cookie_header);
        }
        req
    }

    /// 用登录响应里的 CookieID 合成会话 cookie
    fn absorb_login_identity(&mut self, body: &str) {
        let parsed: serde_json::Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(_) => return,
        };
        let cookie_id = parsed
            .get("Data")
            .and_then(|data| data.get("CookieID"))
            .and_then(|id| id.as_str())
            .unwrap_or("");
        if cookie_id.is_empty() {
            return;
        }

        if self.cookie_header.is_empty() {
            self.cookie_header = format!("_culture=vi-vn; BBOSID={}", cookie_id);
        } else {
            self.cookie_header.push_str(&format!("; BBOSID={}", cookie_id));
        }
        self.cookie_header.push_str(&format!(
            "; BBOAUTH={}X{}",
            cookie_id,
            session::timestamp_millis()
        ));
        if !self.cookie_header.contains("CookieID=") {
            self.cookie_header
                .push_str(&format!("; CookieID={}", cookie_id));
        }
    }
}

/// 构造滑块拖动轨迹：偶数位是 X 坐标从 0 递增到目标值，奇数位
/// 是恒为 0 的 Y 坐标，首元素为最终 X
fn build_trail(x: i64) -> Vec<i64> {
    let mut trail = vec![0i64; 100];
    trail[0] = x;
    for i in (2..100).step_by(2) {
        trail[i] = ((i / 2) as i64).min(x);
    }
    trail
}

fn request_error(endpoint: &str, source: reqwest::Error) -> ClientError {
    ClientError::Request {
        endpoint: endpoint.to_string(),
        source,
    }
}

/// 校验状态码并读取响应体，403 单独归类为 Cookie 失效
async fn read_ok_body(endpoint: &str, resp: reqwest::Response) -> Result<String, ClientError> {
    let status = resp.status().as_u16();
    if status == 403 {
        return Err(ClientError::Forbidden {
            endpoint: endpoint.to_string(),
        });
    }
    if status != 200 {
        return Err(ClientError::BadStatus {
            endpoint: endpoint.to_string(),
            status,
        });
    }

    resp.text()
        .await
        .map_err(|source| request_error(endpoint, source))
}

fn collect_set_cookies(headers: &reqwest::header::HeaderMap) -> String {
    headers
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> SiteClient {
        SiteClient::new(&Config::default(), "user1", "pass1", None).expect("构建客户端")
    }

    #[test]
    fn test_build_trail_shape() {
        let trail = build_trail(57);
        assert_eq!(trail.len(), 100);
        assert_eq!(trail[0], 57);
        assert_eq!(trail[1], 0);
        // 奇数位 Y 坐标恒为 0
        assert!(trail.iter().skip(1).step_by(2).all(|&y| y == 0));
        // 偶数位从小到大且不超过目标 X
        assert_eq!(trail[2], 1);
        assert_eq!(trail[4], 2);
        assert!(trail.iter().skip(2).step_by(2).all(|&x| x <= 57));
    }

    #[test]
    fn test_build_trail_small_x_saturates() {
        let trail = build_trail(3);
        assert_eq!(trail[6], 3);
        // 超过目标后停在目标值
        assert_eq!(trail[8], 3);
        assert_eq!(trail[98], 3);
    }

    #[test]
    fn test_absorb_login_identity_synthesizes_cookies() {
        let mut client = test_client();
        client.cookie_header = "_culture=vi-vn; IT=abc".to_string();
        client.absorb_login_identity(r#"{"Data":{"CookieID":"CID42"}}"#);

        assert!(client.cookie_header.starts_with("_culture=vi-vn; IT=abc; BBOSID=CID42"));
        assert!(client.cookie_header.contains("; BBOAUTH=CID42X"));
        assert!(client.cookie_header.ends_with("; CookieID=CID42"));
    }

    #[test]
    fn test_absorb_login_identity_empty_header_gets_defaults() {
        let mut client = test_client();
        client.absorb_login_identity(r#"{"Data":{"CookieID":"CID7"}}"#);
        assert!(client.cookie_header.starts_with("_culture=vi-vn; BBOSID=CID7"));
    }

    #[test]
    fn test_absorb_login_identity_ignores_missing_id() {
        let mut client = test_client();
        client.cookie_header = "IT=abc".to_string();
        client.absorb_login_identity(r#"{"Data":{"CookieID":""}}"#);
        assert_eq!(client.cookie_header, "IT=abc");
        client.absorb_login_identity("not even json");
        assert_eq!(client.cookie_header, "IT=abc");
    }

    #[test]
    fn test_collect_set_cookies_joins_lines() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.append(
            reqwest::header::SET_COOKIE,
            "IT=a; path=/".parse().expect("header"),
        );
        headers.append(
            reqwest::header::SET_COOKIE,
            "BBOSID=b; path=/".parse().expect("header"),
        );
        assert_eq!(collect_set_cookies(&headers), "IT=a; path=/\nBBOSID=b; path=/");
    }
}
