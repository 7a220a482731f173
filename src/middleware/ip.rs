//! Remote address resolution for request log records.
//!
//! The socket peer address is preferred when the server was started with
//! `into_make_service_with_connect_info`. Otherwise the first hop of
//! `X-Forwarded-For`, then `X-Real-IP`, is used; both are client-controlled
//! and only meaningful behind a proxy that overwrites them.

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;

/// Fallback value when no remote address can be determined.
pub const UNKNOWN_IP: &str = "unknown";

/// Where a remote address was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractedIp<'a> {
    FromXff(&'a str),
    FromRealIp(&'a str),
    NotFound,
}

#[inline]
fn extract_ip_from_headers<B>(req: &Request<B>) -> ExtractedIp<'_> {
    // "client, proxy1, proxy2": the first entry is the client
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first_ip) = value.split(',').next()
    {
        return ExtractedIp::FromXff(first_ip.trim());
    }

    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
    {
        return ExtractedIp::FromRealIp(value.trim());
    }

    ExtractedIp::NotFound
}

/// Client IP from proxy headers, or [`UNKNOWN_IP`].
#[inline]
pub fn extract_client_ip<B>(req: &Request<B>) -> Cow<'static, str> {
    match extract_ip_from_headers(req) {
        ExtractedIp::FromXff(ip) | ExtractedIp::FromRealIp(ip) => Cow::Owned(ip.to_string()),
        ExtractedIp::NotFound => Cow::Borrowed(UNKNOWN_IP),
    }
}

/// Remote address of the caller as `ip:port` when the connection is known,
/// falling back to [`extract_client_ip`].
pub fn remote_addr<B>(req: &Request<B>) -> Cow<'static, str> {
    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => Cow::Owned(addr.to_string()),
        None => extract_client_ip(req),
    }
}
