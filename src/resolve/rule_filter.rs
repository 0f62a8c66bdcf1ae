//! Builds the [`RuleQuery`] for one rule lookup.

use crate::config::{AccessManagerConfig, UNKNOWN_ROLE};
use crate::types::{FilterValue, Principal, RequestContext, RuleQuery};

const WILDCARD: &str = "*";

/// Fluent builder for one rule-store query.
///
/// Service and request come from the [`RequestContext`]; without one both fall
/// back to the default sentinel. A literal `*` becomes the wildcard. Role,
/// workspace and layer strings are passed through untouched.
#[derive(Debug, Clone, Copy)]
pub struct RuleFilterBuilder<'a> {
    config: &'a AccessManagerConfig,
    context: Option<&'a RequestContext>,
    principal: Option<&'a Principal>,
    role: Option<&'a str>,
    workspace: Option<&'a str>,
    layer: Option<&'a str>,
    source_address: Option<&'a str>,
}

impl<'a> RuleFilterBuilder<'a> {
    #[must_use]
    pub fn new(config: &'a AccessManagerConfig) -> Self {
        Self {
            config,
            context: None,
            principal: None,
            role: None,
            workspace: None,
            layer: None,
            source_address: None,
        }
    }

    #[must_use]
    pub fn with_request(mut self, context: Option<&'a RequestContext>) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_user(mut self, principal: &'a Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Pins the role instead of deriving it from the principal's authorities.
    #[must_use]
    pub fn with_role(mut self, role: &'a str) -> Self {
        self.role = Some(role);
        self
    }

    /// `None` targets global objects (default sentinel).
    #[must_use]
    pub fn with_workspace(mut self, workspace: Option<&'a str>) -> Self {
        self.workspace = workspace;
        self
    }

    #[must_use]
    pub fn with_layer(mut self, layer: Option<&'a str>) -> Self {
        self.layer = layer;
        self
    }

    /// Overrides the address carried by the request context.
    #[must_use]
    pub fn with_ip_address(mut self, address: Option<&'a str>) -> Self {
        self.source_address = address;
        self
    }

    #[must_use]
    pub fn build(&self) -> RuleQuery {
        let (service, request) = match self.context {
            Some(ctx) => (
                normalize(ctx.service.as_deref()),
                normalize(ctx.request.as_deref()),
            ),
            None => (FilterValue::Default, FilterValue::Default),
        };

        let address = self
            .source_address
            .or_else(|| self.context.and_then(|ctx| ctx.source_address.as_deref()));
        let source_address = match address {
            Some(ip) => FilterValue::value(ip),
            None => {
                tracing::warn!("no source ip address found");
                FilterValue::Default
            }
        };

        let (user, role) = self.user_and_role();

        RuleQuery {
            user,
            role,
            instance: FilterValue::or_any(self.config.instance_name.as_deref()),
            source_address,
            service,
            request,
            workspace: FilterValue::or_default(self.workspace),
            layer: FilterValue::or_default(self.layer),
        }
    }

    fn user_and_role(&self) -> (FilterValue, FilterValue) {
        let Some(principal) = self.principal else {
            tracing::warn!("no user given");
            return (
                FilterValue::Default,
                FilterValue::or_default(self.role),
            );
        };

        let role = match self.role {
            Some(role) => FilterValue::value(role),
            None => self.configured_role(principal),
        };

        let user = match principal.user_name() {
            Some(name) => {
                tracing::debug!(user = %name, "setting user for filter");
                FilterValue::value(name)
            }
            None => {
                if principal.is_authenticated() {
                    tracing::warn!(authorities = ?principal.authorities, "user name is empty");
                }
                FilterValue::Default
            }
        };
        (user, role)
    }

    fn configured_role(&self, principal: &Principal) -> FilterValue {
        if !self.config.use_roles_to_filter || self.config.roles.is_empty() {
            return FilterValue::Any;
        }
        let accepted = self.config.accepted_roles(&principal.authorities);
        let joined = if accepted.is_empty() {
            UNKNOWN_ROLE.to_string()
        } else {
            accepted.join(",")
        };
        tracing::debug!(role = %joined, "setting role for filter");
        FilterValue::Value(joined)
    }
}

fn normalize(value: Option<&str>) -> FilterValue {
    match value {
        Some(WILDCARD) => FilterValue::Any,
        Some(v) => FilterValue::value(v),
        None => FilterValue::Default,
    }
}
