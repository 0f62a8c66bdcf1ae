//! Error types for access resolution.

use thiserror::Error;

use crate::geometry::Srid;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AccessError>;

/// Broad classification of an [`AccessError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed rule content: CQL text, WKT, style names, non-polygonal masks.
    Configuration,
    /// No transform path between two coordinate reference systems.
    Crs,
    /// A valid decision that the caller must enforce (typically access denied).
    Authorization,
    /// A collaborator (rule store, catalog) failed.
    Lookup,
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("invalid cql filter `{cql}`: {reason}")]
    InvalidFilter { cql: String, reason: String },

    #[error("invalid allowed area wkt: {reason}")]
    InvalidArea { reason: String },

    #[error("cannot convert the area restriction {wkt} to a multi-polygon")]
    NotPolygonal { wkt: String },

    #[error("could not find the default style suggested by the rule: {style}")]
    MissingStyle { style: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("unable to reproject allowed area from EPSG:{from} to EPSG:{to}: {reason}")]
    Crs { from: Srid, to: Srid, reason: String },

    #[error("{reason}")]
    Denied { reason: String },

    #[error("rule lookup failed: {reason}")]
    Lookup { reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AccessError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidFilter { .. }
            | Self::InvalidArea { .. }
            | Self::NotPolygonal { .. }
            | Self::MissingStyle { .. }
            | Self::Configuration { .. }
            | Self::Json(_) => ErrorCategory::Configuration,
            Self::Crs { .. } => ErrorCategory::Crs,
            Self::Denied { .. } => ErrorCategory::Authorization,
            Self::Lookup { .. } => ErrorCategory::Lookup,
        }
    }

    pub(crate) fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }
}
