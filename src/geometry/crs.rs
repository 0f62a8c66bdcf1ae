//! Coordinate reference system transforms for allowed areas.
//!
//! Reprojection is delegated to `proj4rs`. EPSG codes are resolved to proj
//! strings through a small registry: WGS84, ETRS89, spherical mercator (and
//! its legacy aliases) and the WGS84 UTM zones are built in, anything else is
//! registered with [`Proj4Transform::with_definition`].

use std::collections::HashMap;

use geo::{Coord, Geometry, MapCoords};
use proj4rs::Proj;
use tracing::debug;

use super::Srid;
use crate::{AccessError, Result};

/// Geographic WGS84.
pub const EPSG_4326: Srid = 4326;
/// Spherical (web) mercator.
pub const EPSG_3857: Srid = 3857;

const WGS84_DEFINITION: &str = "+proj=longlat +datum=WGS84 +no_defs";
const ETRS89_DEFINITION: &str = "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs";
const WEB_MERCATOR_DEFINITION: &str = concat!(
    "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 ",
    "+units=m +nadgrids=@null +wktext +no_defs"
);

/// Latitude at which spherical mercator becomes a square world.
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// Reprojects geometries between EPSG codes.
///
/// Implementations must return [`AccessError::Crs`] when no transform path
/// exists between the two codes; callers treat that as fatal for the request.
pub trait CrsTransform: Send + Sync {
    fn transform(&self, geometry: &Geometry<f64>, from: Srid, to: Srid) -> Result<Geometry<f64>>;

    /// Whether two codes denote the same CRS (no transform required).
    fn equivalent(&self, a: Srid, b: Srid) -> bool {
        a == b
    }
}

/// Maps legacy aliases onto their canonical EPSG code.
#[must_use]
pub fn canonical_srid(srid: Srid) -> Srid {
    match srid {
        900_913 | 3785 | 102_100 | 102_113 => EPSG_3857,
        other => other,
    }
}

fn builtin_definition(srid: Srid) -> Option<String> {
    match srid {
        EPSG_4326 => Some(WGS84_DEFINITION.to_string()),
        4258 => Some(ETRS89_DEFINITION.to_string()),
        EPSG_3857 => Some(WEB_MERCATOR_DEFINITION.to_string()),
        32_601..=32_660 => Some(format!(
            "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
            srid - 32_600
        )),
        32_701..=32_760 => Some(format!(
            "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
            srid - 32_700
        )),
        _ => None,
    }
}

/// [`CrsTransform`] backed by `proj4rs`.
///
/// Geographic coordinates are read and written in degrees, longitude first.
/// Latitudes are clamped to the mercator limit before a mercator projection.
#[derive(Debug, Clone, Default)]
pub struct Proj4Transform {
    definitions: HashMap<Srid, String>,
}

impl Proj4Transform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or overrides) the proj string used for `srid`.
    #[must_use]
    pub fn with_definition(mut self, srid: Srid, proj_string: impl Into<String>) -> Self {
        self.definitions
            .insert(canonical_srid(srid), proj_string.into());
        self
    }

    /// Whether `srid` resolves to a proj string.
    #[must_use]
    pub fn knows(&self, srid: Srid) -> bool {
        let srid = canonical_srid(srid);
        self.definitions.contains_key(&srid) || builtin_definition(srid).is_some()
    }

    fn projection(&self, srid: Srid, from: Srid, to: Srid) -> Result<Proj> {
        let definition = self
            .definitions
            .get(&srid)
            .cloned()
            .or_else(|| builtin_definition(srid))
            .ok_or_else(|| AccessError::Crs {
                from,
                to,
                reason: format!("no transform path available: EPSG:{srid} is not defined"),
            })?;
        Proj::from_proj_string(&definition).map_err(|err| AccessError::Crs {
            from,
            to,
            reason: format!("invalid definition for EPSG:{srid}: {err}"),
        })
    }
}

fn project(
    src: &Proj,
    dst: &Proj,
    clamp_latitude: bool,
    coord: Coord<f64>,
) -> std::result::Result<Coord<f64>, proj4rs::errors::Error> {
    let mut point = if src.is_latlong() {
        let lat = if clamp_latitude {
            coord.y.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE)
        } else {
            coord.y
        };
        (coord.x.to_radians(), lat.to_radians(), 0.0)
    } else {
        (coord.x, coord.y, 0.0)
    };
    proj4rs::transform::transform(src, dst, &mut point)?;
    if dst.is_latlong() {
        Ok(Coord {
            x: point.0.to_degrees(),
            y: point.1.to_degrees(),
        })
    } else {
        Ok(Coord {
            x: point.0,
            y: point.1,
        })
    }
}

impl CrsTransform for Proj4Transform {
    fn transform(&self, geometry: &Geometry<f64>, from: Srid, to: Srid) -> Result<Geometry<f64>> {
        let (from, to) = (canonical_srid(from), canonical_srid(to));
        if from == to {
            return Ok(geometry.clone());
        }
        let src = self.projection(from, from, to)?;
        let dst = self.projection(to, from, to)?;
        let clamp_latitude = dst.projname() == "merc";
        debug!(from, to, "reprojecting area");

        geometry
            .try_map_coords(|coord| project(&src, &dst, clamp_latitude, coord))
            .map_err(|err| AccessError::Crs {
                from,
                to,
                reason: err.to_string(),
            })
    }

    fn equivalent(&self, a: Srid, b: Srid) -> bool {
        canonical_srid(a) == canonical_srid(b)
    }
}
