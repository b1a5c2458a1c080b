//! UserAgent parsing
//!
//! woothee 解析浏览器、系统与设备类别，xxHash64 生成 16 位十六进制摘要，
//! 事件表只保存摘要和解析结果。

use woothee::parser::Parser;
use xxhash_rust::xxh64::xxh64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSignature {
    pub ua_hash: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    /// desktop / mobile / bot / other
    pub device_type: Option<String>,
}

impl DeviceSignature {
    pub fn is_bot(&self) -> bool {
        self.device_type.as_deref() == Some("bot")
    }
}

pub fn compute_hash(s: &str) -> String {
    format!("{:016x}", xxh64(s.as_bytes(), 0))
}

fn known(value: &str) -> Option<String> {
    if value.is_empty() || value == "UNKNOWN" {
        None
    } else {
        Some(value.to_string())
    }
}

fn device_type_of(category: &str) -> Option<String> {
    let kind = match category {
        "pc" => "desktop",
        "smartphone" | "mobilephone" => "mobile",
        "crawler" => "bot",
        "appliance" | "misc" => "other",
        _ => return None,
    };
    Some(kind.to_string())
}

/// 解析 UserAgent；空字符串返回空签名
pub fn parse_user_agent(ua: &str) -> DeviceSignature {
    let ua = ua.trim();
    if ua.is_empty() {
        return DeviceSignature::default();
    }

    let result = Parser::new().parse(ua).unwrap_or_default();
    DeviceSignature {
        ua_hash: Some(compute_hash(ua)),
        browser: known(result.name),
        os: known(result.os),
        device_type: device_type_of(result.category),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_is_stable() {
        let a = compute_hash("Mozilla/5.0");
        assert_eq!(a.len(), 16);
        assert_eq!(a, compute_hash("Mozilla/5.0"));
        assert_ne!(a, compute_hash("Mozilla/5.1"));
    }

    #[test]
    fn test_parse_desktop_chrome() {
        let sig = parse_user_agent(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        );
        assert_eq!(sig.browser.as_deref(), Some("Chrome"));
        assert_eq!(sig.device_type.as_deref(), Some("desktop"));
        assert!(sig.ua_hash.is_some());
    }

    #[test]
    fn test_parse_iphone() {
        let sig = parse_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
        );
        assert_eq!(sig.os.as_deref(), Some("iPhone"));
        assert_eq!(sig.device_type.as_deref(), Some("mobile"));
    }

    #[test]
    fn test_parse_googlebot() {
        let sig = parse_user_agent(
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
        );
        assert!(sig.is_bot());
    }

    #[test]
    fn test_empty_user_agent() {
        assert_eq!(parse_user_agent("  "), DeviceSignature::default());
    }
}
