//! HTTP front door.
//!
//! Exposes the session over a small JSON API plus a Server-Sent Events
//! stream. The transport only translates between HTTP and the
//! [`SessionHandle`](crate::runtime::SessionHandle); it holds no session
//! state of its own beyond per-user stream counts.

pub mod http;

pub use http::{HttpConfig, bind, build_router};

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use crate::error::TransportError;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Default maximum request body size in bytes (64 KB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 64 * 1024;

/// Header carrying the host credential.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Parses a bind address string into a full `host:port` form.
///
/// Accepts:
/// - `:8080` → `0.0.0.0:8080`
/// - `8080` → `0.0.0.0:8080`
/// - `1.2.3.4:8080` → as-is
///
/// # Errors
///
/// Returns [`TransportError::BindFailed`] if the result cannot be parsed
/// as a socket address.
pub fn parse_bind_addr(input: &str) -> Result<String> {
    let addr = if input.starts_with(':') {
        format!("0.0.0.0{input}")
    } else if input.parse::<u16>().is_ok() {
        format!("0.0.0.0:{input}")
    } else {
        input.to_string()
    };
    addr.parse::<SocketAddr>().map_err(|e| {
        TransportError::BindFailed(format!("invalid bind address \"{input}\": {e}"))
    })?;
    Ok(addr)
}

/// Best-effort discovery of the machine's LAN address.
///
/// Connecting a UDP socket selects the outbound interface without sending
/// any packet. Falls back to loopback when there is no route.
#[must_use]
pub fn discover_lan_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("8.8.8.8:80")?;
        Ok(socket.local_addr()?.ip())
    };
    probe()
        .ok()
        .filter(|ip| !ip.is_unspecified())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Base URL participants should use.
///
/// The configured public URL wins (trailing slash trimmed). Otherwise the
/// bound port is paired with the bound IP, or the discovered LAN IP when
/// bound to a wildcard address.
#[must_use]
pub fn advertised_url(public_url: Option<&str>, bound: SocketAddr) -> String {
    if let Some(url) = public_url {
        return url.trim_end_matches('/').to_string();
    }
    let ip = if bound.ip().is_unspecified() {
        discover_lan_ip()
    } else {
        bound.ip()
    };
    format!("http://{}", SocketAddr::new(ip, bound.port()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bind_addr_forms() {
        assert_eq!(parse_bind_addr(":8080").unwrap(), "0.0.0.0:8080");
        assert_eq!(parse_bind_addr("8080").unwrap(), "0.0.0.0:8080");
        assert_eq!(parse_bind_addr("1.2.3.4:8080").unwrap(), "1.2.3.4:8080");
        assert!(parse_bind_addr("not-an-address").is_err());
    }

    #[test]
    fn public_url_wins() {
        let bound: SocketAddr = "0.0.0.0:5000".parse().unwrap();
        assert_eq!(
            advertised_url(Some("https://pitch.example.org/"), bound),
            "https://pitch.example.org"
        );
    }

    #[test]
    fn concrete_bind_ip_is_advertised() {
        let bound: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(advertised_url(None, bound), "http://127.0.0.1:5000");
    }

    #[test]
    fn lan_ip_is_never_unspecified() {
        assert!(!discover_lan_ip().is_unspecified());
    }
}
