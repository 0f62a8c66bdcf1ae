//! Public types exposed by the `geoaccess-core` crate.

pub mod catalog;
pub mod fact;
pub mod mode;
pub mod query;
pub mod request;

pub use catalog::{
    ContainmentContext, GroupMode, LayerGroupDef, LayerGroupRef, LayerGroupStyle, ResourceKind,
    ResourceRef,
};
pub use fact::{AccessFact, AttributeAccess, GrantType, LayerAttribute};
pub use mode::CatalogMode;
pub use query::{FilterValue, RuleQuery};
pub use request::{Principal, RequestContext};
