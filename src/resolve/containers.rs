//! Layer-group containment limits.
//!
//! A resource reached through layer groups is limited by the rules of those
//! groups as well as its own. Resolution runs in two phases:
//!
//! 1. **Restrict**, per role: the resource's own areas are intersected with
//!    the areas of every containing group, and catalog modes are merged with
//!    [`CatalogMode::stricter`]. The role is then tagged with a
//!    [`RestrictionBucket`] recording which kinds of area its groups defined.
//! 2. **Enlarge**, across roles: results in the same bucket are unioned and
//!    merged with [`CatalogMode::larger`], then the buckets are combined so an
//!    intersect-only bucket never feeds the clip area and vice versa.
//!
//! With a [`ContainmentContext::Flattened`] context every merge between
//! groups and roles uses [`MergePolicy::LessRestrictive`]: one unrestricted
//! path is enough to lift the restriction.

use crate::config::AccessManagerConfig;
use crate::geometry::{AreaAlgebra, Constraint, MergePolicy};
use crate::resolve::rule_filter::RuleFilterBuilder;
use crate::rules::RuleReader;
use crate::types::{
    AccessFact, CatalogMode, ContainmentContext, LayerGroupRef, Principal, RequestContext,
    ResourceRef,
};
use crate::Result;

/// Net spatial and visibility limits of one resolution step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessingResult {
    pub intersect: Constraint,
    pub clip: Constraint,
    pub catalog_mode: CatalogMode,
}

impl ProcessingResult {
    #[must_use]
    pub fn new(intersect: Constraint, clip: Constraint, catalog_mode: CatalogMode) -> Self {
        Self {
            intersect,
            clip,
            catalog_mode,
        }
    }

    /// No area limit, `Hide` mode.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self::default()
    }
}

/// Which kinds of area the containing groups of one role contributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestrictionBucket {
    Both,
    IntersectOnly,
    ClipOnly,
    None,
}

impl RestrictionBucket {
    #[must_use]
    pub fn classify(has_intersect: bool, has_clip: bool) -> Self {
        match (has_intersect, has_clip) {
            (true, true) => Self::Both,
            (true, false) => Self::IntersectOnly,
            (false, true) => Self::ClipOnly,
            (false, false) => Self::None,
        }
    }
}

/// Facts gathered for one role: its own rule on the resource and one rule per
/// containing group, in containment order.
#[derive(Debug, Clone)]
pub struct RoleFacts {
    pub role: String,
    pub resource: AccessFact,
    pub groups: Vec<AccessFact>,
}

/// Phase 1 output for one role.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleLimits {
    pub bucket: RestrictionBucket,
    pub result: ProcessingResult,
}

/// Resolves a resource's limits against the groups that contain it.
pub struct ContainerLimitResolver<'a> {
    reader: &'a dyn RuleReader,
    algebra: AreaAlgebra<'a>,
    config: &'a AccessManagerConfig,
    principal: &'a Principal,
    context: Option<&'a RequestContext>,
}

impl<'a> ContainerLimitResolver<'a> {
    #[must_use]
    pub fn new(
        reader: &'a dyn RuleReader,
        algebra: AreaAlgebra<'a>,
        config: &'a AccessManagerConfig,
        principal: &'a Principal,
        context: Option<&'a RequestContext>,
    ) -> Self {
        Self {
            reader,
            algebra,
            config,
            principal,
            context,
        }
    }

    /// Looks up every role's facts and folds them into one result.
    pub fn resolve(
        &self,
        resource: &ResourceRef,
        containment: &ContainmentContext,
    ) -> Result<ProcessingResult> {
        let facts = self.collect_facts(resource, containment.groups())?;
        resolve_facts(&self.algebra, &facts, containment.less_restrictive())
    }

    /// Roles that take part in the per-role lookups.
    fn roles(&self) -> Vec<&'a str> {
        let authorities = &self.principal.authorities;
        if self.config.use_roles_to_filter && !self.config.roles.is_empty() {
            self.config.accepted_roles(authorities)
        } else {
            authorities.iter().map(String::as_str).collect()
        }
    }

    fn collect_facts(
        &self,
        resource: &ResourceRef,
        groups: &[LayerGroupRef],
    ) -> Result<Vec<RoleFacts>> {
        let mut facts = Vec::new();
        for role in self.roles() {
            let base = RuleFilterBuilder::new(self.config)
                .with_request(self.context)
                .with_user(self.principal)
                .with_role(role);

            let query = base
                .with_workspace(Some(resource.workspace.as_str()))
                .with_layer(Some(resource.name.as_str()))
                .build();
            let resource_fact = self.reader.access_info(&query)?;

            let mut group_facts = Vec::with_capacity(groups.len());
            for group in groups {
                let query = base
                    .with_workspace(group.workspace.as_deref())
                    .with_layer(Some(group.name.as_str()))
                    .build();
                group_facts.push(self.reader.access_info(&query)?);
            }

            facts.push(RoleFacts {
                role: role.to_string(),
                resource: resource_fact,
                groups: group_facts,
            });
        }
        Ok(facts)
    }
}

/// Runs both phases over already gathered facts.
pub fn resolve_facts(
    algebra: &AreaAlgebra<'_>,
    facts: &[RoleFacts],
    less_restrictive: bool,
) -> Result<ProcessingResult> {
    let policy = MergePolicy::from_less_restrictive(less_restrictive);
    let mut per_role = Vec::with_capacity(facts.len());
    for role_facts in facts {
        if !role_facts.resource.grant.is_granting() {
            tracing::debug!(role = %role_facts.role, "role has no grant on the resource, skipping");
            continue;
        }
        let limits = restrict(algebra, role_facts, policy)?;
        tracing::debug!(
            role = %role_facts.role,
            bucket = ?limits.bucket,
            mode = %limits.result.catalog_mode,
            "restricted role limits"
        );
        per_role.push(limits);
    }

    if per_role.is_empty() {
        tracing::debug!("no role takes part in container resolution");
        return Ok(ProcessingResult::unrestricted());
    }
    enlarge(algebra, per_role, policy)
}

/// Phase 1 for one role.
pub fn restrict(
    algebra: &AreaAlgebra<'_>,
    facts: &RoleFacts,
    policy: MergePolicy,
) -> Result<RoleLimits> {
    let less_restrictive = policy == MergePolicy::LessRestrictive;
    let total = facts.groups.len();
    let with_area = facts.groups.iter().filter(|g| g.has_any_area()).count();
    // an unconfigured branch must not read as "unrestricted" when some other
    // branch does carry an area
    let drop_unconfigured = less_restrictive && with_area > 0 && with_area < total;
    let groups: Vec<&AccessFact> = facts
        .groups
        .iter()
        .filter(|g| !drop_unconfigured || g.has_any_area())
        .collect();

    let mut group_intersect: Option<Constraint> = None;
    let mut group_clip: Option<Constraint> = None;
    let mut mode = facts.resource.catalog_mode;
    let mut has_intersect = false;
    let mut has_clip = false;

    for group in &groups {
        has_intersect |= group.area_wkt.is_some();
        has_clip |= group.clip_area_wkt.is_some();

        let intersect = Constraint::parse(group.area_wkt.as_deref())?;
        group_intersect = Some(match group_intersect {
            None => intersect,
            Some(acc) => algebra.reproject_and_intersect_with(&acc, &intersect, policy)?,
        });

        let clip = Constraint::parse(group.clip_area_wkt.as_deref())?;
        group_clip = Some(match group_clip {
            None => clip,
            Some(acc) => algebra.reproject_and_intersect_with(&acc, &clip, policy)?,
        });

        if let Some(group_mode) = group.catalog_mode {
            mode = Some(mode.map_or(group_mode, |m| m.stricter(group_mode)));
        }
    }

    let own_intersect = Constraint::parse(facts.resource.area_wkt.as_deref())?;
    let own_clip = Constraint::parse(facts.resource.clip_area_wkt.as_deref())?;
    let intersect =
        algebra.reproject_and_intersect(&own_intersect, &group_intersect.unwrap_or_default())?;
    let clip = algebra.reproject_and_intersect(&own_clip, &group_clip.unwrap_or_default())?;

    Ok(RoleLimits {
        bucket: RestrictionBucket::classify(has_intersect, has_clip),
        result: ProcessingResult::new(intersect, clip, mode.unwrap_or_default()),
    })
}

/// Phase 2 across roles.
pub fn enlarge(
    algebra: &AreaAlgebra<'_>,
    per_role: Vec<RoleLimits>,
    policy: MergePolicy,
) -> Result<ProcessingResult> {
    let mut both: Option<ProcessingResult> = None;
    let mut intersect_only: Option<ProcessingResult> = None;
    let mut clip_only: Option<ProcessingResult> = None;
    let mut none: Option<ProcessingResult> = None;

    for RoleLimits { bucket, result } in per_role {
        let slot = match bucket {
            RestrictionBucket::Both => &mut both,
            RestrictionBucket::IntersectOnly => &mut intersect_only,
            RestrictionBucket::ClipOnly => &mut clip_only,
            RestrictionBucket::None => &mut none,
        };
        *slot = Some(match slot.take() {
            None => result,
            Some(acc) => ProcessingResult {
                intersect: algebra.reproject_and_union_with(
                    &acc.intersect,
                    &result.intersect,
                    policy,
                )?,
                clip: algebra.reproject_and_union_with(&acc.clip, &result.clip, policy)?,
                catalog_mode: acc.catalog_mode.larger(result.catalog_mode),
            },
        });
    }

    let mut intersect = intersect_only.as_ref().map(|agg| agg.intersect.clone());
    let mut clip = clip_only.as_ref().map(|agg| agg.clip.clone());
    let mut mode: Option<CatalogMode> = None;
    for agg in [&intersect_only, &clip_only].into_iter().flatten() {
        mode = Some(mode.map_or(agg.catalog_mode, |m| m.larger(agg.catalog_mode)));
    }

    for agg in [both, none].into_iter().flatten() {
        intersect = Some(union_into(algebra, intersect, &agg.intersect, policy)?);
        clip = Some(union_into(algebra, clip, &agg.clip, policy)?);
        mode = Some(mode.map_or(agg.catalog_mode, |m| m.larger(agg.catalog_mode)));
    }

    Ok(ProcessingResult::new(
        intersect.unwrap_or_default(),
        clip.unwrap_or_default(),
        mode.unwrap_or_default(),
    ))
}

fn union_into(
    algebra: &AreaAlgebra<'_>,
    acc: Option<Constraint>,
    next: &Constraint,
    policy: MergePolicy,
) -> Result<Constraint> {
    match acc {
        None => Ok(next.clone()),
        Some(acc) => algebra.reproject_and_union_with(&acc, next, policy),
    }
}
