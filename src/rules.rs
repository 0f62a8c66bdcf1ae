//! Collaborator seams: the rule store, the layer-group containment index and
//! the catalog.
//!
//! Rule matching and priority live behind [`RuleReader`]; the resolver only
//! builds queries and combines what comes back.

use crate::Result;
use crate::types::{AccessFact, LayerGroupDef, LayerGroupRef, ResourceRef, RuleQuery};

/// Matches a query against the rule store.
///
/// A query that matches no rule must yield a `DENY` fact rather than an error;
/// errors are reserved for store failures and are propagated unchanged.
pub trait RuleReader: Send + Sync {
    fn access_info(&self, query: &RuleQuery) -> Result<AccessFact>;

    /// Admin-rights lookup used for workspace limits. Only
    /// [`AccessFact::admin_rights`] is meaningful in the answer.
    fn admin_authorization(&self, query: &RuleQuery) -> Result<AccessFact>;
}

/// Reverse index from a resource to every layer group that can reach it,
/// directly or through nested groups.
pub trait ContainmentIndex: Send + Sync {
    fn containers_of(&self, resource: &ResourceRef) -> Vec<LayerGroupRef>;

    /// Groups nesting `group`. Indexes that only track resources return none.
    fn containers_of_group(&self, _group: &LayerGroupRef) -> Vec<LayerGroupRef> {
        Vec::new()
    }
}

/// Read-only view of the catalog needed by the request hooks.
pub trait Catalog: Send + Sync {
    fn style_exists(&self, name: &str) -> bool;

    /// Looks up a layer by `workspace:name` or plain name.
    fn layer_by_name(&self, name: &str) -> Option<ResourceRef>;

    fn layer_group_by_name(&self, name: &str) -> Option<LayerGroupDef>;
}

/// Index for deployments without layer groups.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContainers;

impl ContainmentIndex for NoContainers {
    fn containers_of(&self, _resource: &ResourceRef) -> Vec<LayerGroupRef> {
        Vec::new()
    }
}
