#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::float_cmp,
        clippy::too_many_lines
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions - these are allowed project-wide for pragmatic reasons:
//
// Documentation lints: Many internal/self-documenting functions don't need extensive docs.
// Public APIs should still have proper documentation.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Pattern matching: These pedantic lints often suggest changes that reduce clarity.
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
//
// Performance/ergonomics trade-offs that are acceptable for this codebase:
#![allow(clippy::needless_pass_by_value)] // Many builders take owned values intentionally
#![allow(clippy::return_self_not_must_use)] // Builder patterns don't need must_use on every method
//
// Low-value pedantic lints that add noise:
#![allow(clippy::struct_excessive_bools)] // Config structs naturally have many flags
#![allow(clippy::large_enum_variant)]
#![allow(clippy::unnecessary_wraps)]

/// The geoaccess-core crate version (matches `Cargo.toml`).
pub const GEOACCESS_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod manager;
pub mod resolve;
pub mod rules;
pub mod types;

pub use config::{AccessManagerConfig, AccessManagerConfigBuilder};
pub use error::{AccessError, ErrorCategory, Result};
pub use filter::Filter;
pub use geometry::{Area, AreaAlgebra, Constraint, CrsTransform, MergePolicy, Proj4Transform, Srid};
pub use manager::{
    AccessManager, ContainmentRequest, LegendEntry, LegendRequest, MapLayer, MapRequest,
    check_style_allowed,
};
pub use resolve::{
    ContainerLimitResolver, CoverageAccessLimits, DataAccessLimits, LayerGroupAccessLimits,
    ProcessingResult, RestrictionBucket, RoleFacts, RoleLimits, RuleFilterBuilder,
    VectorAccessLimits, WmsAccessLimits, WmtsAccessLimits, WorkspaceAccessLimits, resolve_facts,
};
pub use rules::{Catalog, ContainmentIndex, NoContainers, RuleReader};
pub use types::{
    AccessFact, AttributeAccess, CatalogMode, ContainmentContext, FilterValue, GrantType,
    GroupMode, LayerAttribute, LayerGroupDef, LayerGroupRef, LayerGroupStyle, Principal,
    RequestContext, ResourceKind, ResourceRef, RuleQuery,
};
