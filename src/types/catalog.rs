//! Catalog identities the resolver works with.

use serde::{Deserialize, Serialize};

use crate::geometry::{DEFAULT_SRID, Srid};

/// Kind of published resource, which selects the limits variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Feature type.
    Vector,
    /// Raster coverage.
    Coverage,
    /// Cascaded remote WMS layer.
    Wms,
    /// Cascaded remote WMTS layer.
    Wmts,
}

/// A layer or resource as seen by the access manager.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct ResourceRef {
    pub workspace: String,
    pub name: String,
    pub kind: ResourceKind,
    /// Native CRS; limits are expressed in it.
    #[serde(default = "default_srid")]
    pub srid: Srid,
}

fn default_srid() -> Srid {
    DEFAULT_SRID
}

impl ResourceRef {
    pub fn new(workspace: impl Into<String>, name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            workspace: workspace.into(),
            name: name.into(),
            kind,
            srid: DEFAULT_SRID,
        }
    }

    #[must_use]
    pub fn with_srid(mut self, srid: Srid) -> Self {
        self.srid = srid;
        self
    }

    /// `workspace:name`.
    #[must_use]
    pub fn prefixed_name(&self) -> String {
        format!("{}:{}", self.workspace, self.name)
    }
}

/// Layer group publishing mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    /// Flat list rendered as one layer; children stay individually reachable.
    Single,
    /// Children are hidden behind the group.
    Opaque,
    #[default]
    Named,
    Container,
    Eo,
}

/// A layer group containing the requested resource.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct LayerGroupRef {
    /// `None` for global groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    pub name: String,
    #[serde(default)]
    pub mode: GroupMode,
}

impl LayerGroupRef {
    pub fn new(workspace: Option<&str>, name: impl Into<String>, mode: GroupMode) -> Self {
        Self {
            workspace: workspace.map(str::to_string),
            name: name.into(),
            mode,
        }
    }
}

/// How a resource relates to the groups that may wrap it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainmentContext {
    /// The groups on the explicit path of the current request (a group was
    /// requested, or the layer is nested under a requested group).
    Explicit(Vec<LayerGroupRef>),
    /// Every group that can reach the resource, from the containment index,
    /// when the layer is accessed directly.
    Flattened(Vec<LayerGroupRef>),
}

impl ContainmentContext {
    /// Flattened containment means any unrestricted path grants unrestricted access.
    #[must_use]
    pub fn less_restrictive(&self) -> bool {
        matches!(self, Self::Flattened(_))
    }

    #[must_use]
    pub fn groups(&self) -> &[LayerGroupRef] {
        match self {
            Self::Explicit(groups) | Self::Flattened(groups) => groups,
        }
    }
}

/// A named alternate rendering of a layer group, with its own layers and styles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerGroupStyle {
    pub name: String,
    pub layers: Vec<ResourceRef>,
    /// Parallel to `layers`.
    pub styles: Vec<Option<String>>,
}

impl LayerGroupStyle {
    pub fn new(
        name: impl Into<String>,
        layers: Vec<ResourceRef>,
        styles: Vec<Option<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            layers,
            styles,
        }
    }
}

/// Group definition used to expand map and legend requests into their layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerGroupDef {
    pub group: LayerGroupRef,
    pub layers: Vec<ResourceRef>,
    /// Configured style per layer (`None` = layer default), parallel to `layers`.
    pub styles: Vec<Option<String>>,
    /// Alternate layer and style sets selectable by name.
    pub group_styles: Vec<LayerGroupStyle>,
}

impl LayerGroupDef {
    pub fn new(
        group: LayerGroupRef,
        layers: Vec<ResourceRef>,
        styles: Vec<Option<String>>,
    ) -> Self {
        Self {
            group,
            layers,
            styles,
            group_styles: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_group_style(mut self, style: LayerGroupStyle) -> Self {
        self.group_styles.push(style);
        self
    }

    /// Layers paired with their configured style for the requested group
    /// style. No name, or a name the group does not define, selects the
    /// default set.
    #[must_use]
    pub fn expand(mut self, style: Option<&str>) -> Vec<(ResourceRef, Option<String>)> {
        let name = style.filter(|name| !name.is_empty());
        let selected = name.and_then(|name| {
            self.group_styles
                .iter()
                .position(|candidate| candidate.name == name)
        });
        let (layers, styles) = match selected {
            Some(index) => {
                let chosen = self.group_styles.swap_remove(index);
                (chosen.layers, chosen.styles)
            }
            None => {
                if let Some(name) = name {
                    tracing::debug!(
                        group = %self.group.name,
                        style = name,
                        "no such group style, using the default layers"
                    );
                }
                (self.layers, self.styles)
            }
        };
        layers
            .into_iter()
            .enumerate()
            .map(|(i, resource)| (resource, styles.get(i).cloned().flatten()))
            .collect()
    }
}
