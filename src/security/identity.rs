//! Client identity resolution.
//!
//! An API key from `Authorization: Bearer|ApiKey <token>` identifies the
//! caller when present; otherwise the client IP does, taken from the first
//! `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address.

use axum::http::{header, HeaderMap};
use std::net::SocketAddr;

const UNKNOWN_IP: &str = "unknown";

/// Subject class used to pick a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    Ip,
    ApiKey,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Ip => "ip",
            SubjectKind::ApiKey => "api_key",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub ip: String,
    pub api_key: Option<String>,
}

impl ClientIdentity {
    pub fn from_headers(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        Self {
            ip: client_ip(headers, peer),
            api_key: api_key(headers),
        }
    }

    /// Identifier used for counting: the API key if present, else the IP.
    pub fn identifier(&self) -> &str {
        self.api_key.as_deref().unwrap_or(&self.ip)
    }

    pub fn subject(&self) -> SubjectKind {
        if self.api_key.is_some() {
            SubjectKind::ApiKey
        } else {
            SubjectKind::Ip
        }
    }

    /// Every identifier this client could be listed under.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.ip.as_str()).chain(self.api_key.as_deref())
    }
}

fn api_key(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("apikey") {
        Some(token.to_string())
    } else {
        None
    }
}

fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}
