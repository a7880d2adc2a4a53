use axum::http::HeaderMap;

use crate::service::AuthConfig;

/// Short-lived cookie carrying the OAuth `state` between redirect and callback.
pub const STATE_COOKIE: &str = "TRICORE_OAUTH_STATE";

/// Lifetime of the state cookie in seconds.
const STATE_MAX_AGE: i64 = 600;

/// Read one cookie value from the request headers.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all("cookie") {
        let Ok(s) = cookie.to_str() else { continue };
        for part in s.split(';') {
            let p = part.trim();
            if let Some((k, v)) = p.split_once('=') {
                if k == name && !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

// SameSite=Lax: the provider's redirect back to the callback is a
// cross-site top-level navigation and must still carry the state cookie.
fn cookie(name: &str, value: &str, max_age: i64, secure: bool) -> String {
    let mut c = format!(
        "{}={}; Max-Age={}; HttpOnly; SameSite=Lax; Path=/",
        name, value, max_age
    );
    if secure {
        c.push_str("; Secure");
    }
    c
}

pub fn session_cookie(config: &AuthConfig, token: &str) -> String {
    cookie(&config.session_cookie, token, config.session_ttl, config.cookie_secure)
}

pub fn state_cookie(config: &AuthConfig, state: &str) -> String {
    cookie(STATE_COOKIE, state, STATE_MAX_AGE, config.cookie_secure)
}

/// Expire a cookie in the browser.
pub fn clear_cookie(config: &AuthConfig, name: &str) -> String {
    let mut c = format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; HttpOnly; SameSite=Lax; Path=/",
        name
    );
    if config.cookie_secure {
        c.push_str("; Secure");
    }
    c
}
