//! Domain authorization guard
//!
//! A PixelApp only accepts events whose page host equals its assigned
//! website domain. An app without an assignment accepts nothing, and an
//! event whose origin host cannot be determined is rejected too.

use std::fmt;

use crate::errors::DenyReason;

/// 域名检查失败原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainRejection {
    NoDomainAssigned,
    MissingHost,
    DomainMismatch { expected: String, actual: String },
}

impl DomainRejection {
    pub fn reason(&self) -> DenyReason {
        match self {
            DomainRejection::NoDomainAssigned => DenyReason::NoDomainAssigned,
            DomainRejection::MissingHost => DenyReason::MissingHost,
            DomainRejection::DomainMismatch { .. } => DenyReason::DomainMismatch,
        }
    }
}

impl fmt::Display for DomainRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainRejection::NoDomainAssigned => write!(f, "no website domain assigned"),
            DomainRejection::MissingHost => write!(f, "request origin host is unknown"),
            DomainRejection::DomainMismatch { expected, actual } => {
                write!(f, "host '{}' does not match assigned '{}'", actual, expected)
            }
        }
    }
}

/// 规范化域名：小写，去协议、`www.` 前缀、尾部斜杠和空白
pub fn normalize_domain(input: &str) -> String {
    let mut s = input.trim().to_ascii_lowercase();

    for scheme in ["https://", "http://"] {
        if let Some(rest) = s.strip_prefix(scheme) {
            s = rest.to_string();
            break;
        }
    }
    if let Some(rest) = s.strip_prefix("www.") {
        s = rest.to_string();
    }

    s.trim_end_matches('/').trim().to_string()
}

/// 从 URL 提取 host；无协议的输入按 `/ ? # :` 手动切分
pub fn host_of(raw_url: &str) -> Option<String> {
    let trimmed = raw_url.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = url::Url::parse(trimmed)
        && let Some(host) = parsed.host_str()
    {
        return Some(normalize_domain(host));
    }

    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    let host = without_scheme
        .split(['/', '?', '#', ':'])
        .next()
        .unwrap_or_default();

    let normalized = normalize_domain(host);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// 检查请求 host 是否匹配绑定域名
///
/// 未绑定域名时无论 host 为何都拒绝；host 为空时拒绝为 `MissingHost`。
pub fn check_domain(request_host: &str, assignment: Option<&str>) -> Result<(), DomainRejection> {
    let Some(assigned) = assignment else {
        return Err(DomainRejection::NoDomainAssigned);
    };

    let expected = normalize_domain(assigned);
    if expected.is_empty() {
        return Err(DomainRejection::NoDomainAssigned);
    }

    let actual = normalize_domain(request_host);
    if actual.is_empty() {
        return Err(DomainRejection::MissingHost);
    }
    if actual == expected {
        Ok(())
    } else {
        Err(DomainRejection::DomainMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("  HTTPS://www.MyStore.com/ "), "mystore.com");
        assert_eq!(normalize_domain("http://shop.example.com//"), "shop.example.com");
        assert_eq!(normalize_domain("mystore.myshopify.com"), "mystore.myshopify.com");
        assert_eq!(normalize_domain(""), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["https://www.a.com/", "B.COM", " www.c.io "] {
            let once = normalize_domain(raw);
            assert_eq!(normalize_domain(&once), once);
        }
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            host_of("https://mystore.myshopify.com/products/x?v=1").as_deref(),
            Some("mystore.myshopify.com")
        );
        assert_eq!(host_of("https://www.Evil.com:8443/").as_deref(), Some("evil.com"));
        assert_eq!(host_of("mystore.com/cart#top").as_deref(), Some("mystore.com"));
        assert_eq!(host_of("shop.io:8080").as_deref(), Some("shop.io"));
        assert_eq!(host_of("   "), None);
    }

    #[test]
    fn test_check_domain_accepts_equal_after_normalization() {
        assert!(check_domain("WWW.mystore.com", Some("https://mystore.com/")).is_ok());
    }

    #[test]
    fn test_check_domain_rejects_mismatch() {
        let err = check_domain("evil.com", Some("mystore.myshopify.com")).unwrap_err();
        assert_eq!(err.reason(), DenyReason::DomainMismatch);
        assert_eq!(
            err,
            DomainRejection::DomainMismatch {
                expected: "mystore.myshopify.com".to_string(),
                actual: "evil.com".to_string(),
            }
        );
    }

    #[test]
    fn test_check_domain_without_assignment_rejects() {
        assert_eq!(
            check_domain("mystore.com", None),
            Err(DomainRejection::NoDomainAssigned)
        );
        assert_eq!(
            check_domain("mystore.com", Some("  ")),
            Err(DomainRejection::NoDomainAssigned)
        );
        // 无绑定优先于缺失 host
        assert_eq!(check_domain("", None), Err(DomainRejection::NoDomainAssigned));
    }

    #[test]
    fn test_check_domain_rejects_empty_host() {
        let err = check_domain("  ", Some("mystore.com")).unwrap_err();
        assert_eq!(err, DomainRejection::MissingHost);
        assert_eq!(err.reason(), DenyReason::MissingHost);
    }

    #[test]
    fn test_subdomain_is_not_accepted() {
        assert!(check_domain("shop.mystore.com", Some("mystore.com")).is_err());
    }
}
