//! Caller identity and operation context for one request.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Authenticated (or anonymous) caller.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
pub struct Principal {
    /// User name; `None` or empty for unnamed callers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Granted authorities (roles).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorities: Vec<String>,
    #[serde(default)]
    pub anonymous: bool,
}

impl Principal {
    pub fn user<S: Into<String>>(
        name: impl Into<String>,
        authorities: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            authorities: authorities.into_iter().map(Into::into).collect(),
            anonymous: false,
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            name: None,
            authorities: vec!["ROLE_ANONYMOUS".to_string()],
            anonymous: true,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.anonymous
    }

    /// Name with empty strings collapsed to `None`.
    #[must_use]
    pub fn user_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

/// The operation being served: OWS service, request name and caller address.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
pub struct RequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_address: Option<String>,
}

impl RequestContext {
    pub fn new(service: impl Into<String>, request: impl Into<String>) -> Self {
        Self {
            service: Some(service.into()),
            request: Some(request.into()),
            source_address: None,
        }
    }

    #[must_use]
    pub fn with_source_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = Some(address.into());
        self
    }

    /// Resolves the caller address from an `X-Forwarded-For` header (first hop
    /// wins) or the socket remote address. IPv6 brackets are stripped.
    /// Unparseable values yield `None`.
    #[must_use]
    pub fn resolve_source_address(
        forwarded_for: Option<&str>,
        remote_addr: Option<&str>,
    ) -> Option<String> {
        let candidate = match forwarded_for {
            Some(header) => header.split(',').next().map(str::trim)?,
            None => remote_addr?.trim(),
        };
        let stripped: String = candidate.chars().filter(|c| *c != '[' && *c != ']').collect();
        match stripped.parse::<IpAddr>() {
            Ok(ip) => Some(ip.to_string()),
            Err(err) => {
                tracing::debug!(
                    address = %candidate,
                    error = %err,
                    "failed to parse remote address"
                );
                None
            }
        }
    }

    #[must_use]
    pub fn is_service(&self, service: &str) -> bool {
        self.service
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(service))
    }

    #[must_use]
    pub fn is_request(&self, request: &str) -> bool {
        self.request
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(request))
    }
}
