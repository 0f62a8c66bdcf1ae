//! Entry points: limits for workspaces, layers, resources and layer groups.

mod styles;

pub use styles::{LegendEntry, LegendRequest, MapLayer, MapRequest, check_style_allowed};

use std::fmt;
use std::sync::Arc;

use crate::config::AccessManagerConfig;
use crate::geometry::{AreaAlgebra, CrsTransform, Proj4Transform};
use crate::resolve::containers::{ContainerLimitResolver, ProcessingResult};
use crate::resolve::limits::{
    DataAccessLimits, LayerGroupAccessLimits, WorkspaceAccessLimits, build_layer_group_limits,
    build_resource_limits,
};
use crate::resolve::rule_filter::RuleFilterBuilder;
use crate::rules::{Catalog, ContainmentIndex, NoContainers, RuleReader};
use crate::types::{
    AccessFact, ContainmentContext, GroupMode, LayerGroupRef, Principal, RequestContext,
    ResourceRef,
};
use crate::Result;

/// How the requested object was reached.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContainmentRequest {
    /// Accessed on its own. For WMS the containment index decides which
    /// groups may still limit it.
    #[default]
    Direct,
    /// Reached through these groups in the current request.
    Within(Vec<LayerGroupRef>),
}

impl ContainmentRequest {
    fn explicit_groups(&self) -> Option<&[LayerGroupRef]> {
        match self {
            Self::Within(groups) if !groups.is_empty() => Some(groups),
            _ => None,
        }
    }
}

/// What direct WMS access should do given the groups that contain the target.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DirectAccess {
    /// No group limits apply.
    Unlimited,
    /// Every container hides its children.
    Denied,
    Resolve(Vec<LayerGroupRef>),
}

impl DirectAccess {
    fn from_containers(containers: Vec<LayerGroupRef>) -> Self {
        if containers.is_empty() {
            Self::Unlimited
        } else if containers.iter().all(|g| g.mode == GroupMode::Opaque) {
            Self::Denied
        } else if containers.iter().any(|g| g.mode == GroupMode::Single) {
            Self::Unlimited
        } else {
            Self::Resolve(containers)
        }
    }
}

/// Resolves access limits against a rule store.
///
/// Holds only shared collaborators and an immutable configuration; one
/// instance serves concurrent requests.
pub struct AccessManager {
    reader: Arc<dyn RuleReader>,
    catalog: Arc<dyn Catalog>,
    containment: Arc<dyn ContainmentIndex>,
    crs: Arc<dyn CrsTransform>,
    config: AccessManagerConfig,
}

impl fmt::Debug for AccessManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AccessManager {
    pub fn new(
        reader: Arc<dyn RuleReader>,
        catalog: Arc<dyn Catalog>,
        config: AccessManagerConfig,
    ) -> Self {
        let crs = config
            .crs_definitions
            .iter()
            .fold(Proj4Transform::new(), |crs, (srid, definition)| {
                crs.with_definition(*srid, definition.clone())
            });
        Self {
            reader,
            catalog,
            containment: Arc::new(NoContainers),
            crs: Arc::new(crs),
            config,
        }
    }

    #[must_use]
    pub fn with_containment_index(mut self, index: Arc<dyn ContainmentIndex>) -> Self {
        self.containment = index;
        self
    }

    #[must_use]
    pub fn with_crs(mut self, crs: Arc<dyn CrsTransform>) -> Self {
        self.crs = crs;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AccessManagerConfig {
        &self.config
    }

    fn algebra(&self) -> AreaAlgebra<'_> {
        AreaAlgebra::new(self.crs.as_ref())
    }

    /// Authenticated callers holding an admin role bypass every rule.
    #[must_use]
    pub fn is_admin(&self, principal: &Principal) -> bool {
        principal.is_authenticated() && self.config.is_admin(&principal.authorities)
    }

    fn lookup(
        &self,
        principal: &Principal,
        context: Option<&RequestContext>,
        workspace: Option<&str>,
        layer: &str,
    ) -> Result<AccessFact> {
        let query = RuleFilterBuilder::new(&self.config)
            .with_request(context)
            .with_user(principal)
            .with_workspace(workspace)
            .with_layer(Some(layer))
            .build();
        tracing::debug!(query = %query, "looking up access info");
        self.reader.access_info(&query)
    }

    pub fn workspace_limits(
        &self,
        principal: &Principal,
        workspace: &str,
        context: Option<&RequestContext>,
    ) -> Result<WorkspaceAccessLimits> {
        tracing::debug!(workspace, "getting access limits for workspace");
        if !principal.is_authenticated() {
            return Ok(WorkspaceAccessLimits::new(true, false, false));
        }
        if self.is_admin(principal) {
            tracing::debug!(workspace, "admin level access, returning full rights");
            return Ok(WorkspaceAccessLimits::new(true, true, true));
        }

        let query = RuleFilterBuilder::new(&self.config)
            .with_user(principal)
            .with_workspace(Some(workspace))
            .with_ip_address(context.and_then(|ctx| ctx.source_address.as_deref()))
            .build();
        let auth = self.reader.admin_authorization(&query)?;
        tracing::debug!(
            workspace,
            user = ?principal.user_name(),
            admin = auth.admin_rights,
            "admin authorization"
        );

        Ok(WorkspaceAccessLimits::new(
            true,
            self.config.grant_write_to_workspaces_to_authenticated_users,
            auth.admin_rights,
        ))
    }

    /// Limits for a layer, possibly reached through layer groups.
    pub fn layer_limits(
        &self,
        principal: &Principal,
        layer: &ResourceRef,
        containers: &ContainmentRequest,
        context: Option<&RequestContext>,
    ) -> Result<DataAccessLimits> {
        if self.is_admin(principal) {
            tracing::debug!(
                layer = %layer.prefixed_name(),
                "admin level access, returning full rights"
            );
            return build_resource_limits(&self.algebra(), layer, &AccessFact::allow_all(), None);
        }

        let workspace = Some(layer.workspace.as_str());
        let mut fact = self.lookup(principal, context, workspace, &layer.name)?;
        let is_wms = context.is_some_and(|ctx| ctx.is_service("WMS"));

        let containment = match containers.explicit_groups() {
            Some(groups) => Some(ContainmentContext::Explicit(groups.to_vec())),
            None if is_wms => {
                match DirectAccess::from_containers(self.containment.containers_of(layer)) {
                    DirectAccess::Unlimited => None,
                    DirectAccess::Denied => {
                        tracing::debug!(
                            layer = %layer.prefixed_name(),
                            "all containers are opaque, denying direct access"
                        );
                        fact = deny_keeping_mode(&fact);
                        None
                    }
                    DirectAccess::Resolve(groups) => Some(ContainmentContext::Flattened(groups)),
                }
            }
            None => None,
        };

        let result = match &containment {
            Some(containment) => {
                Some(self.resolve_containers(principal, layer, containment, context)?)
            }
            None => None,
        };

        let limits = build_resource_limits(&self.algebra(), layer, &fact, result.as_ref())?;
        tracing::debug!(
            layer = %layer.prefixed_name(),
            user = ?principal.user_name(),
            mode = %limits.catalog_mode(),
            "returning layer limits"
        );
        Ok(limits)
    }

    /// Limits for a resource accessed on its own.
    pub fn resource_limits(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        context: Option<&RequestContext>,
    ) -> Result<DataAccessLimits> {
        tracing::debug!(resource = %resource.prefixed_name(), "getting access limits for resource");
        self.layer_limits(principal, resource, &ContainmentRequest::Direct, context)
    }

    /// `None` means the group is fully accessible.
    pub fn layer_group_limits(
        &self,
        principal: &Principal,
        group: &LayerGroupRef,
        containers: &ContainmentRequest,
        context: Option<&RequestContext>,
    ) -> Result<Option<LayerGroupAccessLimits>> {
        if self.is_admin(principal) {
            return Ok(None);
        }

        let mut fact = self.lookup(principal, context, group.workspace.as_deref(), &group.name)?;
        let is_wms = context.is_some_and(|ctx| ctx.is_service("WMS"));
        if containers.explicit_groups().is_none()
            && is_wms
            && DirectAccess::from_containers(self.containment.containers_of_group(group))
                == DirectAccess::Denied
        {
            tracing::debug!(
                group = %group.name,
                "all containers are opaque, denying direct access"
            );
            fact = deny_keeping_mode(&fact);
        }
        Ok(build_layer_group_limits(&fact))
    }

    /// Runs container resolution and brings the areas into the resource's CRS.
    fn resolve_containers(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        containment: &ContainmentContext,
        context: Option<&RequestContext>,
    ) -> Result<ProcessingResult> {
        let algebra = self.algebra();
        let resolver = ContainerLimitResolver::new(
            self.reader.as_ref(),
            algebra,
            &self.config,
            principal,
            context,
        );
        let result = resolver.resolve(resource, containment)?;
        Ok(ProcessingResult {
            intersect: result.intersect.reproject(resource.srid, algebra.crs())?,
            clip: result.clip.reproject(resource.srid, algebra.crs())?,
            catalog_mode: result.catalog_mode,
        })
    }
}

fn deny_keeping_mode(fact: &AccessFact) -> AccessFact {
    let mut denied = AccessFact::deny_all();
    denied.catalog_mode = fact.catalog_mode;
    denied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CatalogMode;

    fn group(mode: GroupMode) -> LayerGroupRef {
        LayerGroupRef::new(None, "g", mode)
    }

    #[test]
    fn direct_access_modes() {
        assert_eq!(DirectAccess::from_containers(vec![]), DirectAccess::Unlimited);
        assert_eq!(
            DirectAccess::from_containers(vec![group(GroupMode::Opaque), group(GroupMode::Opaque)]),
            DirectAccess::Denied
        );
        assert_eq!(
            DirectAccess::from_containers(vec![group(GroupMode::Single), group(GroupMode::Named)]),
            DirectAccess::Unlimited
        );
        assert!(matches!(
            DirectAccess::from_containers(vec![group(GroupMode::Opaque), group(GroupMode::Named)]),
            DirectAccess::Resolve(groups) if groups.len() == 2
        ));
    }

    #[test]
    fn empty_explicit_list_is_direct() {
        assert!(ContainmentRequest::Within(vec![]).explicit_groups().is_none());
        assert!(ContainmentRequest::Direct.explicit_groups().is_none());
    }

    #[test]
    fn deny_keeps_catalog_mode() {
        let mut fact = AccessFact::allow_all().with_catalog_mode(CatalogMode::Challenge);
        fact.cql_filter_read = Some("a = 1".into());
        let denied = deny_keeping_mode(&fact);
        assert!(!denied.grant.is_granting());
        assert!(denied.cql_filter_read.is_none());
        assert_eq!(denied.catalog_mode, Some(CatalogMode::Challenge));
    }
}
