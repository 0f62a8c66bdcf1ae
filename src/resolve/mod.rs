//! Rule lookups and the folds that turn them into enforceable limits.

pub mod containers;
pub mod limits;
pub mod rule_filter;

pub use containers::{
    ContainerLimitResolver, ProcessingResult, RestrictionBucket, RoleFacts, RoleLimits,
    resolve_facts,
};
pub use limits::{
    CoverageAccessLimits, DataAccessLimits, LayerGroupAccessLimits, VectorAccessLimits,
    WmsAccessLimits, WmtsAccessLimits, WorkspaceAccessLimits,
};
pub use rule_filter::RuleFilterBuilder;
