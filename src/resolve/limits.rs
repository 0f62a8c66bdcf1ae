//! Turns a resolved fact into the limits enforced by the data layer.

use geo::MultiPolygon;

use crate::filter::Filter;
use crate::geometry::{Area, AreaAlgebra, Constraint};
use crate::resolve::containers::ProcessingResult;
use crate::types::{AccessFact, CatalogMode, GrantType, ResourceKind, ResourceRef};
use crate::Result;

/// Limits on a feature type.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorAccessLimits {
    pub catalog_mode: CatalogMode,
    /// `None` means every attribute.
    pub read_attributes: Option<Vec<String>>,
    pub read_filter: Filter,
    pub write_attributes: Option<Vec<String>>,
    pub write_filter: Filter,
    /// Geometries are clipped to this area on output.
    pub clip_vector_filter: Option<Area>,
    /// Features must intersect this area.
    pub intersect_vector_filter: Option<Area>,
}

/// Limits on a raster coverage.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageAccessLimits {
    pub catalog_mode: CatalogMode,
    pub read_filter: Filter,
    /// Output is masked outside these polygons.
    pub raster_filter: Option<MultiPolygon<f64>>,
}

/// Limits on a cascaded WMS layer.
#[derive(Debug, Clone, PartialEq)]
pub struct WmsAccessLimits {
    pub catalog_mode: CatalogMode,
    pub read_filter: Filter,
    pub raster_filter: Option<MultiPolygon<f64>>,
    pub allow_feature_info: bool,
}

/// Limits on a cascaded WMTS layer.
#[derive(Debug, Clone, PartialEq)]
pub struct WmtsAccessLimits {
    pub catalog_mode: CatalogMode,
    pub read_filter: Filter,
    pub raster_filter: Option<MultiPolygon<f64>>,
}

/// Enforceable decision for one published resource, by resource kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DataAccessLimits {
    Vector(VectorAccessLimits),
    Coverage(CoverageAccessLimits),
    Wms(WmsAccessLimits),
    Wmts(WmtsAccessLimits),
}

impl DataAccessLimits {
    #[must_use]
    pub fn catalog_mode(&self) -> CatalogMode {
        match self {
            Self::Vector(l) => l.catalog_mode,
            Self::Coverage(l) => l.catalog_mode,
            Self::Wms(l) => l.catalog_mode,
            Self::Wmts(l) => l.catalog_mode,
        }
    }

    #[must_use]
    pub fn read_filter(&self) -> &Filter {
        match self {
            Self::Vector(l) => &l.read_filter,
            Self::Coverage(l) => &l.read_filter,
            Self::Wms(l) => &l.read_filter,
            Self::Wmts(l) => &l.read_filter,
        }
    }

    /// Whether nothing at all can be read.
    #[must_use]
    pub fn denies_all(&self) -> bool {
        self.read_filter().is_exclude()
    }
}

/// Limits on a layer group. Granting rules produce no limits at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerGroupAccessLimits {
    pub catalog_mode: CatalogMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceAccessLimits {
    pub catalog_mode: CatalogMode,
    pub readable: bool,
    pub writable: bool,
    pub adminable: bool,
}

impl WorkspaceAccessLimits {
    #[must_use]
    pub fn new(readable: bool, writable: bool, adminable: bool) -> Self {
        Self {
            catalog_mode: CatalogMode::default(),
            readable,
            writable,
            adminable,
        }
    }
}

fn parse_filter(cql: Option<&str>, grant: GrantType) -> Result<Filter> {
    match cql {
        Some(text) => Filter::parse_ecql(text),
        None if grant.is_granting() => Ok(Filter::Include),
        None => Ok(Filter::Exclude),
    }
}

fn to_mask(constraint: &Constraint) -> Result<Option<MultiPolygon<f64>>> {
    constraint.area().map(Area::to_multi_polygon).transpose()
}

/// Builds the limits for `resource` from its fact and, when containers were
/// resolved, their aggregated result (already in the resource's CRS).
pub fn build_resource_limits(
    algebra: &AreaAlgebra<'_>,
    resource: &ResourceRef,
    fact: &AccessFact,
    containers: Option<&ProcessingResult>,
) -> Result<DataAccessLimits> {
    let mut read_filter = parse_filter(fact.cql_filter_read.as_deref(), fact.grant)?;
    let mut write_filter = parse_filter(fact.cql_filter_write.as_deref(), fact.grant)?;

    let (intersect, clip) = match containers {
        Some(result) => (result.intersect.clone(), result.clip.clone()),
        None => (
            Constraint::parse(fact.area_wkt.as_deref())?.reproject(resource.srid, algebra.crs())?,
            Constraint::parse(fact.clip_area_wkt.as_deref())?
                .reproject(resource.srid, algebra.crs())?,
        ),
    };

    let catalog_mode = containers
        .map(|result| result.catalog_mode)
        .or(fact.catalog_mode)
        .unwrap_or_default();
    tracing::debug!(
        resource = %resource.prefixed_name(),
        mode = %catalog_mode,
        "resolved catalog mode"
    );

    let limits = match resource.kind {
        ResourceKind::Vector => {
            if let Some(area) = intersect.area() {
                let mut area_filter = Filter::intersects(area.clone());
                if let Some(clip_area) = clip.area() {
                    area_filter = area_filter.or(Filter::intersects(clip_area.clone()));
                }
                read_filter = read_filter.and(area_filter.clone());
                write_filter = write_filter.and(area_filter);
            }
            DataAccessLimits::Vector(VectorAccessLimits {
                catalog_mode,
                read_attributes: fact.read_attributes(),
                read_filter,
                write_attributes: fact.write_attributes(),
                write_filter,
                clip_vector_filter: clip.into_area(),
                intersect_vector_filter: intersect.into_area(),
            })
        }
        ResourceKind::Coverage => {
            let mask = algebra.reproject_and_union(&clip, &intersect)?;
            DataAccessLimits::Coverage(CoverageAccessLimits {
                catalog_mode,
                read_filter,
                raster_filter: to_mask(&mask)?,
            })
        }
        ResourceKind::Wms => DataAccessLimits::Wms(WmsAccessLimits {
            catalog_mode,
            read_filter,
            raster_filter: to_mask(&intersect)?,
            allow_feature_info: true,
        }),
        ResourceKind::Wmts => DataAccessLimits::Wmts(WmtsAccessLimits {
            catalog_mode,
            read_filter,
            raster_filter: to_mask(&intersect)?,
        }),
    };
    Ok(limits)
}

/// `None` for granting facts: the group is fully visible.
#[must_use]
pub fn build_layer_group_limits(fact: &AccessFact) -> Option<LayerGroupAccessLimits> {
    if fact.grant.is_granting() {
        None
    } else {
        Some(LayerGroupAccessLimits {
            catalog_mode: fact.catalog_mode.unwrap_or_default(),
        })
    }
}
