use axum::http::HeaderMap;
use std::fmt;
use std::net::SocketAddr;

/// Proxy headers consulted for the client address, in order of precedence
const CLIENT_IP_HEADERS: [&str; 3] = ["X-Forwarded-For", "X-Real-IP", "CF-Connecting-IP"];

/// Input to the unique-visitor HyperLogLog. Never stored as an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorIdentity(String);

impl VisitorIdentity {
    pub fn user(user_id: i64) -> Self {
        Self(format!("user:{}", user_id))
    }

    pub fn ip(address: &str) -> Self {
        Self(format!("ip:{}", address))
    }

    /// Authenticated users are counted by id, everyone else by address.
    pub fn resolve(user_id: Option<i64>, client_ip: &str) -> Self {
        match user_id {
            Some(id) => Self::user(id),
            None => Self::ip(client_ip),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisitorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Best-effort client address: proxy headers first, then the peer socket.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    for name in CLIENT_IP_HEADERS {
        let first = headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.split(',').next())
            .map(str::trim)
            .filter(|h| !h.is_empty());

        if let Some(ip) = first {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
