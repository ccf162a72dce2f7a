//! Client IP extraction for rate limiting.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};

/// Extract the client IP address.
///
/// If `ip_header` is set (running behind a proxy), the first address in that
/// header is used and a missing header is an error; there is no fallback to
/// the socket address. Otherwise the peer address from `ConnectInfo` is used.
pub fn extract_client_ip(request: &Request, ip_header: Option<&str>) -> Result<String, &'static str> {
    match ip_header {
        Some(name) => {
            let value = request
                .headers()
                .get(name)
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            // X-Forwarded-For style lists put the original client first
            let ip = value.split(',').next().map(str::trim).unwrap_or_default();
            if ip.is_empty() {
                return Err("IP header is empty");
            }
            Ok(ip.to_string())
        }
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .ok_or("No client IP available"),
    }
}
