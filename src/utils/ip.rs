//! 客户端 IP 解析
//!
//! 只在连接来自可信代理时才采信 `X-Forwarded-For` / `X-Real-IP`：
//! - 配置了 trusted_proxies：peer 命中列表才采信
//! - 未配置：peer 为私有地址或 localhost 时视为反向代理
//! - 其他情况使用连接地址，防止伪造

use std::net::{IpAddr, SocketAddr};

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;
use tracing::debug;

/// 私有地址或 localhost（含 IPv6 ULA 与 link-local）
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            let head = v6.segments()[0];
            v6.is_loopback() || (head & 0xfe00) == 0xfc00 || (head & 0xffc0) == 0xfe80
        }
    }
}

/// 可用于地理定位的公网地址
pub fn is_public(ip: &IpAddr) -> bool {
    !ip.is_unspecified() && !ip.is_multicast() && !is_private_or_local(ip)
}

/// 解析 `ip` 或 `ip:port`
pub fn parse_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|s| s.ip()))
}

/// CIDR 匹配，协议族不同时不匹配
pub fn ip_in_cidr(ip: &IpAddr, cidr: &str) -> bool {
    let Some((network, prefix)) = cidr.split_once('/') else {
        return false;
    };
    let (Ok(network), Ok(prefix)) = (network.parse::<IpAddr>(), prefix.parse::<u32>()) else {
        return false;
    };

    match (ip, network) {
        (IpAddr::V4(ip), IpAddr::V4(net)) if prefix <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
            (u32::from(*ip) & mask) == (u32::from(net) & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) if prefix <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
            (u128::from(*ip) & mask) == (u128::from(net) & mask)
        }
        _ => false,
    }
}

/// peer 是否命中可信代理列表（单 IP 或 CIDR）
pub fn is_trusted_proxy(peer: &IpAddr, trusted_proxies: &[String]) -> bool {
    trusted_proxies.iter().any(|entry| {
        if entry.contains('/') {
            ip_in_cidr(peer, entry)
        } else {
            parse_ip(entry).is_some_and(|proxy| proxy == *peer)
        }
    })
}

/// 从请求头取转发的客户端 IP：X-Forwarded-For 第一个，其次 X-Real-IP
pub fn forwarded_ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    let from_xff = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(parse_ip);

    from_xff.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .and_then(parse_ip)
    })
}

/// 按代理信任策略确定客户端 IP
pub fn resolve_client_ip(
    peer: Option<IpAddr>,
    forwarded: Option<IpAddr>,
    trusted_proxies: &[String],
) -> Option<IpAddr> {
    let Some(peer) = peer else {
        return forwarded;
    };

    let peer_is_proxy = if trusted_proxies.is_empty() {
        is_private_or_local(&peer)
    } else {
        is_trusted_proxy(&peer, trusted_proxies)
    };

    if peer_is_proxy && let Some(real) = forwarded {
        debug!("Proxy {} forwarded client {}", peer, real);
        return Some(real);
    }
    Some(peer)
}

pub fn extract_client_ip(req: &HttpRequest, trusted_proxies: &[String]) -> Option<IpAddr> {
    let peer = req.peer_addr().map(|addr| addr.ip());
    resolve_client_ip(peer, forwarded_ip_from_headers(req.headers()), trusted_proxies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_private_and_public() {
        assert!(is_private_or_local(&ip("10.0.0.1")));
        assert!(is_private_or_local(&ip("192.168.1.1")));
        assert!(is_private_or_local(&ip("127.0.0.1")));
        assert!(is_private_or_local(&ip("fd00::1")));
        assert!(is_private_or_local(&ip("fe80::1")));
        assert!(is_public(&ip("8.8.8.8")));
        assert!(is_public(&ip("2001:4860:4860::8888")));
        assert!(!is_public(&ip("0.0.0.0")));
    }

    #[test]
    fn test_ip_in_cidr() {
        assert!(ip_in_cidr(&ip("192.168.1.100"), "192.168.1.0/24"));
        assert!(!ip_in_cidr(&ip("192.168.2.1"), "192.168.1.0/24"));
        assert!(ip_in_cidr(&ip("2001:db8::1"), "2001:db8::/32"));
        assert!(!ip_in_cidr(&ip("2001:db8::1"), "10.0.0.0/8"));
        assert!(ip_in_cidr(&ip("1.2.3.4"), "0.0.0.0/0"));
        assert!(!ip_in_cidr(&ip("1.2.3.4"), "1.2.3.4/40"));
    }

    #[test]
    fn test_is_trusted_proxy() {
        let proxies = vec!["127.0.0.1".to_string(), "172.16.0.0/12".to_string()];
        assert!(is_trusted_proxy(&ip("127.0.0.1"), &proxies));
        assert!(is_trusted_proxy(&ip("172.20.1.1"), &proxies));
        assert!(!is_trusted_proxy(&ip("8.8.8.8"), &proxies));
    }

    #[test]
    fn test_forwarded_header_order() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-real-ip"),
            HeaderValue::from_static("9.9.9.9"),
        );
        assert_eq!(forwarded_ip_from_headers(&headers), Some(ip("9.9.9.9")));

        headers.insert(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("203.0.113.7, 10.0.0.2"),
        );
        assert_eq!(forwarded_ip_from_headers(&headers), Some(ip("203.0.113.7")));
    }

    #[test]
    fn test_public_peer_cannot_spoof() {
        let resolved = resolve_client_ip(Some(ip("8.8.8.8")), Some(ip("1.1.1.1")), &[]);
        assert_eq!(resolved, Some(ip("8.8.8.8")));
    }

    #[test]
    fn test_private_peer_is_auto_proxy() {
        let resolved = resolve_client_ip(Some(ip("10.0.0.5")), Some(ip("1.1.1.1")), &[]);
        assert_eq!(resolved, Some(ip("1.1.1.1")));
    }

    #[test]
    fn test_explicit_list_overrides_auto_detection() {
        let proxies = vec!["10.0.0.9".to_string()];
        let resolved = resolve_client_ip(Some(ip("10.0.0.5")), Some(ip("1.1.1.1")), &proxies);
        assert_eq!(resolved, Some(ip("10.0.0.5")));

        let resolved = resolve_client_ip(Some(ip("10.0.0.9")), Some(ip("1.1.1.1")), &proxies);
        assert_eq!(resolved, Some(ip("1.1.1.1")));
    }
}
