//! Access manager configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::geometry::Srid;

/// Role given to the administrators.
pub const ROOT_ROLE: &str = "ROLE_ADMINISTRATOR";
/// Built-in admin authority.
pub const ADMIN_ROLE: &str = "ADMIN";
/// Role sent to the rule store when role filtering leaves nothing.
pub const UNKNOWN_ROLE: &str = "UNKNOWN";

fn default_admin_roles() -> Vec<String> {
    vec![ROOT_ROLE.to_string(), ADMIN_ROLE.to_string()]
}

/// Settings shared by every resolution.
///
/// Loaded once and never mutated; the manager only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessManagerConfig {
    /// Name of this server instance in the rule store. `None` matches any.
    #[serde(default)]
    pub instance_name: Option<String>,
    /// Send the caller's (filtered) roles to the rule store instead of `ANY`.
    #[serde(default)]
    pub use_roles_to_filter: bool,
    /// Accepted roles for `use_roles_to_filter`. `*` accepts every role and a
    /// `-` prefix excludes one, e.g. `["*", "-ROLE_ANONYMOUS"]`.
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub grant_write_to_workspaces_to_authenticated_users: bool,
    /// Let GetMap carry remote (cascaded OWS) and inline layers.
    #[serde(default)]
    pub allow_remote_and_inline_layers: bool,
    /// Authorities that bypass every rule.
    #[serde(default = "default_admin_roles")]
    pub admin_roles: Vec<String>,
    /// Extra proj strings keyed by EPSG code, for native CRSs that are not
    /// built in.
    #[serde(default)]
    pub crs_definitions: BTreeMap<Srid, String>,
}

impl Default for AccessManagerConfig {
    fn default() -> Self {
        Self {
            instance_name: None,
            use_roles_to_filter: false,
            roles: Vec::new(),
            grant_write_to_workspaces_to_authenticated_users: false,
            allow_remote_and_inline_layers: false,
            admin_roles: default_admin_roles(),
            crs_definitions: BTreeMap::new(),
        }
    }
}

impl AccessManagerConfig {
    /// Start a fluent builder for `AccessManagerConfig`.
    #[must_use]
    pub fn builder() -> AccessManagerConfigBuilder {
        AccessManagerConfigBuilder::default()
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.use_roles_to_filter && config.roles.is_empty() {
            tracing::warn!(
                "role filtering requested, but no roles provided; will only use user authorizations"
            );
        }
        Ok(config)
    }

    /// Whether any authority is an admin role.
    pub fn is_admin<S: AsRef<str>>(&self, authorities: &[S]) -> bool {
        authorities
            .iter()
            .any(|authority| self.admin_roles.iter().any(|admin| admin == authority.as_ref()))
    }

    /// Keeps the authorities accepted by [`Self::roles`], in the caller's order.
    pub fn accepted_roles<'a, S: AsRef<str>>(&self, authorities: &'a [S]) -> Vec<&'a str> {
        let accept_all = self.roles.iter().any(|role| role == "*");
        let excluded: Vec<&str> = self
            .roles
            .iter()
            .filter_map(|role| role.strip_prefix('-'))
            .collect();

        authorities
            .iter()
            .map(AsRef::as_ref)
            .filter(|authority| accept_all || self.roles.iter().any(|role| role == authority))
            .filter(|authority| !excluded.contains(authority))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccessManagerConfigBuilder {
    inner: AccessManagerConfig,
}

impl AccessManagerConfigBuilder {
    pub fn instance_name<S: Into<String>>(mut self, name: S) -> Self {
        self.inner.instance_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn use_roles_to_filter(mut self, enabled: bool) -> Self {
        self.inner.use_roles_to_filter = enabled;
        self
    }

    pub fn role<S: Into<String>>(mut self, role: S) -> Self {
        self.inner.roles.push(role.into());
        self
    }

    #[must_use]
    pub fn grant_write_to_workspaces_to_authenticated_users(mut self, enabled: bool) -> Self {
        self.inner.grant_write_to_workspaces_to_authenticated_users = enabled;
        self
    }

    #[must_use]
    pub fn allow_remote_and_inline_layers(mut self, enabled: bool) -> Self {
        self.inner.allow_remote_and_inline_layers = enabled;
        self
    }

    pub fn admin_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.admin_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn crs_definition<S: Into<String>>(mut self, srid: Srid, proj_string: S) -> Self {
        self.inner.crs_definitions.insert(srid, proj_string.into());
        self
    }

    #[must_use]
    pub fn build(self) -> AccessManagerConfig {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_defaults() {
        let config = AccessManagerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AccessManagerConfig::default());
        assert_eq!(config.admin_roles, vec!["ROLE_ADMINISTRATOR", "ADMIN"]);
    }

    #[test]
    fn json_overrides() {
        let config = AccessManagerConfig::from_json_str(
            r#"{"instance_name":"gs-1","use_roles_to_filter":true,"roles":["*","-ROLE_X"]}"#,
        )
        .unwrap();
        assert_eq!(config.instance_name.as_deref(), Some("gs-1"));
        assert!(config.use_roles_to_filter);
        assert_eq!(config.roles.len(), 2);
    }

    #[test]
    fn json_crs_definitions_keyed_by_code() {
        let config = AccessManagerConfig::from_json_str(
            r#"{"crs_definitions":{"27700":"+proj=tmerc +lat_0=49 +lon_0=-2 +ellps=airy"}}"#,
        )
        .unwrap();
        assert!(config.crs_definitions[&27_700].starts_with("+proj=tmerc"));
    }

    #[test]
    fn malformed_json_is_configuration_error() {
        let err = AccessManagerConfig::from_json_str("{not json").unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Configuration);
    }

    #[test]
    fn wildcard_with_exclusion() {
        let config = AccessManagerConfig::builder()
            .use_roles_to_filter(true)
            .role("*")
            .role("-ROLE_X")
            .build();
        let roles = config.accepted_roles(&["ROLE_A", "ROLE_X", "ROLE_B"]);
        assert_eq!(roles, vec!["ROLE_A", "ROLE_B"]);
    }

    #[test]
    fn explicit_list_only() {
        let config = AccessManagerConfig::builder().role("ROLE_B").build();
        assert_eq!(config.accepted_roles(&["ROLE_A", "ROLE_B"]), vec!["ROLE_B"]);
        assert!(config.accepted_roles(&["ROLE_C"]).is_empty());
    }

    #[test]
    fn admin_detection() {
        let config = AccessManagerConfig::default();
        assert!(config.is_admin(&["ROLE_USER", "ADMIN"]));
        assert!(!config.is_admin(&["ROLE_USER"]));
    }
}
