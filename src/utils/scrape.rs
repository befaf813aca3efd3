//! 页面与 Cookie 提取工具
//!
//! 登录站点把防伪 token 和会话 Cookie 分散在 HTML 和 Set-Cookie 头里，
//! 这里集中提供对应的正则提取函数

use regex::Regex;

/// 从落地页 HTML 中提取防伪 token
///
/// # 参数
/// - `html`: 落地页 HTML
///
/// # 返回
/// 找到则返回 token 值，否则返回 None
pub fn extract_token(html: &str) -> Option<String> {
    let re = Regex::new(r#"<ajax-anti-forgery-token token="([^"]+)"></ajax-anti-forgery-token>"#)
        .ok()?;
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// 从 HTML 中提取 IdyKey（可能不存在）
pub fn extract_idy_key(html: &str) -> Option<String> {
    let re = Regex::new(r#"IdyKey['"]*:\s*['"]([\w-]+)['"]"#).ok()?;
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// 从 Set-Cookie 文本中提取指定名称的 cookie 值
///
/// # 参数
/// - `cookies`: 原始 Set-Cookie 文本（可多行）
/// - `name`: cookie 名称
pub fn extract_cookie_value(cookies: &str, name: &str) -> Option<String> {
    let re = Regex::new(&format!(r"{}=([^;]+)", name)).ok()?;
    re.captures(cookies)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// 提取会话 cookie 值，优先 IT，缺失时回退 BBOSID
pub fn extract_session_cookie(cookies: &str) -> Option<String> {
    extract_cookie_value(cookies, "IT").or_else(|| extract_cookie_value(cookies, "BBOSID"))
}

/// 把响应里的各个会话 cookie 组装成一条 Cookie 头
///
/// 依次收集 _culture、IT、BBOSID、targetUrl、BBOAUTH，
/// _culture 缺失时补默认值 vi-vn
///
/// # 参数
/// - `cookies`: 原始 Set-Cookie 文本
///
/// # 返回
/// 返回 "name=value; name=value" 形式的 Cookie 串
pub fn assemble_cookie_header(cookies: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    match extract_cookie_value(cookies, "_culture") {
        Some(value) => parts.push(format!("_culture={}", value)),
        None => parts.push("_culture=vi-vn".to_string()),
    }

    for name in ["IT", "BBOSID", "targetUrl", "BBOAUTH"] {
        if let Some(value) = extract_cookie_value(cookies, name) {
            parts.push(format!("{}={}", name, value));
        }
    }

    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDING_HTML: &str = concat!(
        "<html><head></head><body>",
        r#"<ajax-anti-forgery-token token="CfDJ8AbC-123"></ajax-anti-forgery-token>"#,
        r#"<script>var opts = { IdyKey: 'k-77f0', retry: 1 };</script>"#,
        "</body></html>"
    );

    #[test]
    fn test_extract_token_from_landing_page() {
        assert_eq!(extract_token(LANDING_HTML).as_deref(), Some("CfDJ8AbC-123"));
        assert_eq!(extract_token("<html>no token</html>"), None);
    }

    #[test]
    fn test_extract_idy_key_quote_variants() {
        assert_eq!(extract_idy_key(LANDING_HTML).as_deref(), Some("k-77f0"));
        assert_eq!(
            extract_idy_key(r#"{"IdyKey":"abc-def"}"#).as_deref(),
            Some("abc-def")
        );
        assert_eq!(extract_idy_key("<html></html>"), None);
    }

    #[test]
    fn test_extract_session_cookie_prefers_it() {
        let raw = "IT=it-value; path=/\nBBOSID=sid-value; path=/";
        assert_eq!(extract_session_cookie(raw).as_deref(), Some("it-value"));
    }

    #[test]
    fn test_extract_session_cookie_falls_back_to_bbosid() {
        let raw = "BBOSID=sid-value; path=/; HttpOnly";
        assert_eq!(extract_session_cookie(raw).as_deref(), Some("sid-value"));
        assert_eq!(extract_session_cookie("other=x; path=/"), None);
    }

    #[test]
    fn test_assemble_cookie_header_collects_known_names() {
        let raw = concat!(
            "_culture=zh-cn; path=/\n",
            "IT=it-1; path=/; HttpOnly\n",
            "BBOSID=sid-1; path=/\n",
            "targetUrl=/Member; path=/\n",
            "BBOAUTH=auth-1; path=/"
        );
        assert_eq!(
            assemble_cookie_header(raw),
            "_culture=zh-cn; IT=it-1; BBOSID=sid-1; targetUrl=/Member; BBOAUTH=auth-1"
        );
    }

    #[test]
    fn test_assemble_cookie_header_defaults_culture() {
        let raw = "IT=it-1; path=/";
        assert_eq!(assemble_cookie_header(raw), "_culture=vi-vn; IT=it-1");
        // 什么都没有时也至少有默认语言
        assert_eq!(assemble_cookie_header(""), "_culture=vi-vn");
    }
}
