//! Request-derived audit fields attached to relationally stored records.

use serde::Serialize;

use crate::naming::{
    MAX_IP_ADDRESS_LENGTH, MAX_REQUEST_ID_LENGTH, MAX_SESSION_ID_LENGTH, MAX_USER_AGENT_LENGTH,
};

/// Read access to the ambient request, implemented by the hosting web layer.
///
/// Every accessor is optional; a missing value yields a `None` audit field.
pub trait RequestContext: Send + Sync {
    /// Raw `X-Forwarded-For` header value.
    fn forwarded_for(&self) -> Option<String>;
    /// Address of the directly connected peer.
    fn remote_addr(&self) -> Option<String>;
    fn user_agent(&self) -> Option<String>;
    fn session_id(&self) -> Option<String>;
    /// Trace or request identifier.
    fn trace_id(&self) -> Option<String>;
}

/// Audit fields captured from a request at write time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
}

impl AuditContext {
    /// Capture audit fields from `request`, or none at all when there is no
    /// request (background jobs, startup tasks).
    ///
    /// Values longer than their column are truncated.
    pub fn capture(request: Option<&dyn RequestContext>) -> Self {
        let Some(request) = request else {
            return Self::default();
        };
        Self {
            ip_address: client_ip(
                request.forwarded_for().as_deref(),
                request.remote_addr().as_deref(),
            )
            .map(|ip| truncate_chars(ip, MAX_IP_ADDRESS_LENGTH)),
            user_agent: non_blank(request.user_agent())
                .map(|v| truncate_chars(v, MAX_USER_AGENT_LENGTH)),
            session_id: non_blank(request.session_id())
                .map(|v| truncate_chars(v, MAX_SESSION_ID_LENGTH)),
            request_id: non_blank(request.trace_id())
                .map(|v| truncate_chars(v, MAX_REQUEST_ID_LENGTH)),
        }
    }
}

/// Resolve the client IP: the first entry of `X-Forwarded-For` when present,
/// otherwise the direct peer address.
pub fn client_ip(forwarded_for: Option<&str>, remote_addr: Option<&str>) -> Option<String> {
    let forwarded = forwarded_for
        .and_then(|header| header.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    forwarded
        .or_else(|| remote_addr.map(str::trim).filter(|ip| !ip.is_empty()))
        .map(str::to_string)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn truncate_chars(value: String, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((byte_idx, _)) => value[..byte_idx].to_string(),
        None => value,
    }
}
