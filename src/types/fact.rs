//! Access facts: the outcome of one rule lookup.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::mode::CatalogMode;

/// Grant carried by the matched rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantType {
    Allow,
    Deny,
    /// Allowed with limits (area, attributes, filters).
    Limit,
}

impl GrantType {
    /// `Allow` and `Limit` both let data through.
    #[must_use]
    pub fn is_granting(self) -> bool {
        matches!(self, Self::Allow | Self::Limit)
    }
}

/// Per-attribute access level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeAccess {
    None,
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct LayerAttribute {
    pub name: String,
    pub access: AttributeAccess,
}

impl LayerAttribute {
    pub fn new(name: impl Into<String>, access: AttributeAccess) -> Self {
        Self {
            name: name.into(),
            access,
        }
    }
}

/// Result of one rule lookup. Produced fresh per lookup and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct AccessFact {
    pub grant: GrantType,
    /// Allowed area as `[SRID=n;]WKT`; `None` means unrestricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_wkt: Option<String>,
    /// Clip area as `[SRID=n;]WKT`; `None` means unrestricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_area_wkt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_mode: Option<CatalogMode>,
    /// Attribute access list; `None` means every attribute is accessible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<LayerAttribute>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cql_filter_read: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cql_filter_write: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_style: Option<String>,
    /// Styles a client may request explicitly; empty means unrestricted.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub allowed_styles: BTreeSet<String>,
    #[serde(default)]
    pub admin_rights: bool,
}

impl AccessFact {
    #[must_use]
    pub fn new(grant: GrantType) -> Self {
        Self {
            grant,
            area_wkt: None,
            clip_area_wkt: None,
            catalog_mode: None,
            attributes: None,
            cql_filter_read: None,
            cql_filter_write: None,
            default_style: None,
            allowed_styles: BTreeSet::new(),
            admin_rights: false,
        }
    }

    #[must_use]
    pub fn allow_all() -> Self {
        Self::new(GrantType::Allow)
    }

    #[must_use]
    pub fn deny_all() -> Self {
        Self::new(GrantType::Deny)
    }

    #[must_use]
    pub fn with_area(mut self, wkt: impl Into<String>) -> Self {
        self.area_wkt = Some(wkt.into());
        self
    }

    #[must_use]
    pub fn with_clip_area(mut self, wkt: impl Into<String>) -> Self {
        self.clip_area_wkt = Some(wkt.into());
        self
    }

    #[must_use]
    pub fn with_catalog_mode(mut self, mode: CatalogMode) -> Self {
        self.catalog_mode = Some(mode);
        self
    }

    #[must_use]
    pub fn with_grant(mut self, grant: GrantType) -> Self {
        self.grant = grant;
        self
    }

    /// Whether the fact carries an allowed area or a clip area.
    #[must_use]
    pub fn has_any_area(&self) -> bool {
        self.area_wkt.is_some() || self.clip_area_wkt.is_some()
    }

    /// Names readable under this fact; `None` means all of them.
    #[must_use]
    pub fn read_attributes(&self) -> Option<Vec<String>> {
        self.attribute_names(|access| {
            matches!(access, AttributeAccess::ReadOnly | AttributeAccess::ReadWrite)
        })
    }

    /// Names writable under this fact; `None` means all of them.
    #[must_use]
    pub fn write_attributes(&self) -> Option<Vec<String>> {
        self.attribute_names(|access| access == AttributeAccess::ReadWrite)
    }

    fn attribute_names(&self, eligible: impl Fn(AttributeAccess) -> bool) -> Option<Vec<String>> {
        let attributes = self.attributes.as_ref()?;
        let names: Vec<String> = attributes
            .iter()
            .filter(|attribute| eligible(attribute.access))
            .map(|attribute| attribute.name.clone())
            .collect();
        // downstream wrappers expect "no list" rather than an empty one
        if names.is_empty() { None } else { Some(names) }
    }

    /// `{default_style} ∪ allowed_styles`.
    #[must_use]
    pub fn permitted_styles(&self) -> BTreeSet<&str> {
        self.default_style
            .iter()
            .map(String::as_str)
            .chain(self.allowed_styles.iter().map(String::as_str))
            .collect()
    }
}
