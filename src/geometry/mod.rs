//! Allowed-area algebra.
//!
//! Rules attach allowed areas (used in query predicates) and clip areas (used
//! to mask rendered output) as SRID-tagged WKT. This module parses them,
//! reprojects them and combines them. A missing area is modelled as
//! [`Constraint::Unrestricted`], which is different from an empty geometry:
//! an empty intersection denies everything, an unrestricted constraint
//! narrows nothing.

mod crs;

pub use crs::{CrsTransform, EPSG_3857, EPSG_4326, Proj4Transform, canonical_srid};

use std::fmt;

use geo::{BooleanOps, Geometry, MultiPolygon, Polygon};
use once_cell::sync::OnceCell;
use regex::Regex;
use wkt::{ToWkt, TryFromWkt};

use crate::{AccessError, Result};

/// EPSG code of a coordinate reference system.
pub type Srid = u32;

/// CRS assumed for WKT without an `SRID=` prefix.
pub const DEFAULT_SRID: Srid = EPSG_4326;

/// How an unrestricted operand behaves when two constraints are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Unrestricted is the identity: the other operand is returned.
    #[default]
    Absorbing,
    /// Unrestricted wins: any unrestricted path makes the result unrestricted.
    LessRestrictive,
}

impl MergePolicy {
    #[must_use]
    pub fn from_less_restrictive(less_restrictive: bool) -> Self {
        if less_restrictive {
            Self::LessRestrictive
        } else {
            Self::Absorbing
        }
    }
}

/// A geometry tagged with the CRS it is expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    geometry: Geometry<f64>,
    srid: Srid,
}

impl Area {
    #[must_use]
    pub fn new(geometry: Geometry<f64>, srid: Srid) -> Self {
        Self { geometry, srid }
    }

    /// Parses `[SRID=<n>;]<wkt>`. Without a prefix the CRS is EPSG:4326.
    pub fn parse(text: &str) -> Result<Self> {
        static SRID_PREFIX: OnceCell<std::result::Result<Regex, String>> = OnceCell::new();
        let regex = SRID_PREFIX
            .get_or_init(|| {
                Regex::new(r"(?is)^\s*SRID\s*=\s*(\d+)\s*;(.*)$").map_err(|err| err.to_string())
            })
            .as_ref()
            .map_err(|reason| AccessError::InvalidArea {
                reason: reason.clone(),
            })?;

        let (srid, body) = match regex.captures(text) {
            Some(caps) => {
                let srid = caps[1].parse::<Srid>().map_err(|err| AccessError::InvalidArea {
                    reason: format!("bad SRID prefix: {err}"),
                })?;
                (srid, caps.get(2).map_or("", |m| m.as_str()))
            }
            None => (DEFAULT_SRID, text),
        };

        let geometry = Geometry::<f64>::try_from_wkt_str(body.trim()).map_err(|err| {
            AccessError::InvalidArea {
                reason: err.to_string(),
            }
        })?;
        Ok(Self { geometry, srid })
    }

    #[must_use]
    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    #[must_use]
    pub fn srid(&self) -> Srid {
        self.srid
    }

    #[must_use]
    pub fn into_geometry(self) -> Geometry<f64> {
        self.geometry
    }

    #[must_use]
    pub fn wkt(&self) -> String {
        self.geometry.wkt_string()
    }

    /// Extended WKT, `SRID=<n>;<wkt>`.
    #[must_use]
    pub fn ewkt(&self) -> String {
        format!("SRID={};{}", self.srid, self.wkt())
    }

    pub fn reproject(&self, target: Srid, crs: &dyn CrsTransform) -> Result<Self> {
        if crs.equivalent(self.srid, target) {
            return Ok(Self {
                geometry: self.geometry.clone(),
                srid: target,
            });
        }
        let geometry = crs.transform(&self.geometry, self.srid, target)?;
        Ok(Self {
            geometry,
            srid: target,
        })
    }

    /// Reduces the geometry to a multi-polygon, failing for points and lines.
    pub fn to_multi_polygon(&self) -> Result<MultiPolygon<f64>> {
        let mut polygons = Vec::new();
        if collect_polygons(&self.geometry, &mut polygons) {
            Ok(MultiPolygon::new(polygons))
        } else {
            Err(AccessError::NotPolygonal { wkt: self.wkt() })
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.geometry {
            Geometry::MultiPolygon(mp) => mp.0.is_empty(),
            Geometry::GeometryCollection(gc) => gc.0.is_empty(),
            Geometry::MultiLineString(ml) => ml.0.is_empty(),
            Geometry::MultiPoint(mp) => mp.0.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ewkt())
    }
}

fn collect_polygons(geometry: &Geometry<f64>, out: &mut Vec<Polygon<f64>>) -> bool {
    match geometry {
        Geometry::Polygon(p) => out.push(p.clone()),
        Geometry::MultiPolygon(mp) => out.extend(mp.0.iter().cloned()),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for member in &gc.0 {
                if !collect_polygons(member, out) {
                    return false;
                }
            }
        }
        _ => return false,
    }
    true
}

/// A spatial limit: either nothing, or an area the data must fall in.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Constraint {
    #[default]
    Unrestricted,
    Area(Area),
}

impl Constraint {
    /// `None` parses to [`Constraint::Unrestricted`].
    pub fn parse(wkt: Option<&str>) -> Result<Self> {
        match wkt {
            None => Ok(Self::Unrestricted),
            Some(text) => Area::parse(text).map(Self::Area),
        }
    }

    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Unrestricted)
    }

    #[must_use]
    pub fn area(&self) -> Option<&Area> {
        match self {
            Self::Area(area) => Some(area),
            Self::Unrestricted => None,
        }
    }

    #[must_use]
    pub fn into_area(self) -> Option<Area> {
        match self {
            Self::Area(area) => Some(area),
            Self::Unrestricted => None,
        }
    }

    pub fn reproject(&self, target: Srid, crs: &dyn CrsTransform) -> Result<Self> {
        match self {
            Self::Unrestricted => Ok(Self::Unrestricted),
            Self::Area(area) => area.reproject(target, crs).map(Self::Area),
        }
    }
}

impl From<Area> for Constraint {
    fn from(area: Area) -> Self {
        Self::Area(area)
    }
}

impl From<Option<Area>> for Constraint {
    fn from(area: Option<Area>) -> Self {
        area.map_or(Self::Unrestricted, Self::Area)
    }
}

#[derive(Debug, Clone, Copy)]
enum SetOp {
    Intersection,
    Union,
}

/// Intersection and union of constraints with reprojection.
///
/// The right-hand operand is always reprojected into the CRS of the
/// left-hand one, and the result carries the left-hand CRS.
#[derive(Clone, Copy)]
pub struct AreaAlgebra<'a> {
    crs: &'a dyn CrsTransform,
}

impl fmt::Debug for AreaAlgebra<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AreaAlgebra").finish_non_exhaustive()
    }
}

impl<'a> AreaAlgebra<'a> {
    #[must_use]
    pub fn new(crs: &'a dyn CrsTransform) -> Self {
        Self { crs }
    }

    #[must_use]
    pub fn crs(&self) -> &'a dyn CrsTransform {
        self.crs
    }

    pub fn reproject_and_intersect(&self, a: &Constraint, b: &Constraint) -> Result<Constraint> {
        self.combine(a, b, MergePolicy::Absorbing, SetOp::Intersection)
    }

    pub fn reproject_and_union(&self, a: &Constraint, b: &Constraint) -> Result<Constraint> {
        self.combine(a, b, MergePolicy::Absorbing, SetOp::Union)
    }

    pub fn reproject_and_intersect_with(
        &self,
        a: &Constraint,
        b: &Constraint,
        policy: MergePolicy,
    ) -> Result<Constraint> {
        self.combine(a, b, policy, SetOp::Intersection)
    }

    pub fn reproject_and_union_with(
        &self,
        a: &Constraint,
        b: &Constraint,
        policy: MergePolicy,
    ) -> Result<Constraint> {
        self.combine(a, b, policy, SetOp::Union)
    }

    fn combine(
        &self,
        a: &Constraint,
        b: &Constraint,
        policy: MergePolicy,
        op: SetOp,
    ) -> Result<Constraint> {
        match (a, b, policy) {
            (Constraint::Unrestricted, _, MergePolicy::LessRestrictive)
            | (_, Constraint::Unrestricted, MergePolicy::LessRestrictive) => {
                Ok(Constraint::Unrestricted)
            }
            (Constraint::Unrestricted, other, MergePolicy::Absorbing)
            | (other, Constraint::Unrestricted, MergePolicy::Absorbing) => Ok(other.clone()),
            (Constraint::Area(left), Constraint::Area(right), _) => {
                let right = right.reproject(left.srid, self.crs)?;
                let lhs = left.to_multi_polygon()?;
                let rhs = right.to_multi_polygon()?;
                let merged = match op {
                    SetOp::Intersection => lhs.intersection(&rhs),
                    SetOp::Union => lhs.union(&rhs),
                };
                Ok(Constraint::Area(Area::new(
                    Geometry::MultiPolygon(merged),
                    left.srid,
                )))
            }
        }
    }
}
