//! Style authorization for GetMap, GetFeatureInfo and GetLegendGraphic.
//!
//! Before a map or legend is rendered each layer's rule is looked up: a layer
//! without an explicit style gets the rule's default style, an explicit style
//! must be one the rule permits.

use std::collections::BTreeMap;

use super::AccessManager;
use crate::resolve::rule_filter::RuleFilterBuilder;
use crate::rules::Catalog;
use crate::types::{AccessFact, Principal, RequestContext, ResourceRef};
use crate::{AccessError, Result};

/// One layer of a map request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapLayer {
    pub name: String,
    /// `None` for remote (cascaded OWS) and inline layers.
    pub resource: Option<ResourceRef>,
    /// Explicitly requested style; the hook fills in the rule default.
    pub style: Option<String>,
}

impl MapLayer {
    #[must_use]
    pub fn local(resource: ResourceRef, style: Option<String>) -> Self {
        Self {
            name: resource.prefixed_name(),
            resource: Some(resource),
            style,
        }
    }

    pub fn remote(name: impl Into<String>, style: Option<String>) -> Self {
        Self {
            name: name.into(),
            resource: None,
            style,
        }
    }
}

/// The parts of a GetMap (or the GetMap inside a GetFeatureInfo) the hook
/// inspects and rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MapRequest {
    /// Whether the request carried `LAYERS`.
    pub has_layers: bool,
    /// Whether the request carried `SLD` or `SLD_BODY`.
    pub has_sld: bool,
    pub layers: Vec<MapLayer>,
}

fn kvp_get<'a>(kvp: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    kvp.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

/// Splits a flat KVP list; empty entries stay empty.
fn read_flat(raw: &str) -> Vec<&str> {
    raw.split(',').map(str::trim).collect()
}

impl MapRequest {
    /// Builds the request from raw KVP parameters, resolving each `LAYERS`
    /// entry against the catalog. Layer groups expand into their layers, with
    /// the group's configured styles standing in as explicit styles. A style
    /// given for a group selects one of its alternate group styles.
    pub fn from_kvp(kvp: &BTreeMap<String, String>, catalog: &dyn Catalog) -> Result<Self> {
        let layers_param = kvp_get(kvp, "LAYERS");
        let styles: Vec<&str> = kvp_get(kvp, "STYLES").map(read_flat).unwrap_or_default();

        let mut layers = Vec::new();
        for (i, name) in layers_param.map(read_flat).unwrap_or_default().into_iter().enumerate() {
            if name.is_empty() {
                continue;
            }
            let requested = styles
                .get(i)
                .filter(|style| !style.is_empty())
                .map(|style| (*style).to_string());

            if let Some(resource) = catalog.layer_by_name(name) {
                layers.push(MapLayer::local(resource, requested));
            } else if let Some(group) = catalog.layer_group_by_name(name) {
                for (resource, style) in group.expand(requested.as_deref()) {
                    layers.push(MapLayer::local(resource, style));
                }
            } else {
                return Err(AccessError::Configuration {
                    reason: format!("could not find layer {name}"),
                });
            }
        }

        Ok(Self {
            has_layers: layers_param.is_some(),
            has_sld: kvp_get(kvp, "SLD").is_some() || kvp_get(kvp, "SLD_BODY").is_some(),
            layers,
        })
    }
}

/// A GetLegendGraphic request: one layer or layer group name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendRequest {
    pub layer: String,
    pub style: Option<String>,
}

impl LegendRequest {
    pub fn new(layer: impl Into<String>, style: Option<String>) -> Self {
        Self {
            layer: layer.into(),
            style,
        }
    }
}

/// A layer to draw in a legend, with the style it must be drawn with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendEntry {
    pub resource: ResourceRef,
    pub style: Option<String>,
}

/// Rejects `style` unless the fact permits it. An empty permitted set
/// (no default, no allowed styles) accepts anything.
pub fn check_style_allowed(fact: &AccessFact, style: &str) -> Result<()> {
    let permitted = fact.permitted_styles();
    if permitted.is_empty() || permitted.contains(style) {
        Ok(())
    } else {
        Err(AccessError::denied(format!(
            "the '{style}' style is not available on this layer"
        )))
    }
}

impl AccessManager {
    fn is_map_request(context: &RequestContext) -> bool {
        context.is_service("WMS")
            && (context.is_request("GetMap") || context.is_request("GetFeatureInfo"))
    }

    fn style_fact(
        &self,
        principal: &Principal,
        context: &RequestContext,
        resource: Option<&ResourceRef>,
    ) -> Result<AccessFact> {
        let query = RuleFilterBuilder::new(&self.config)
            .with_request(Some(context))
            .with_user(principal)
            .with_workspace(resource.map(|r| r.workspace.as_str()))
            .with_layer(resource.map(|r| r.name.as_str()))
            .build();
        tracing::debug!(query = %query, "getting style limits");
        self.reader.access_info(&query)
    }

    /// Resolves the style a layer is drawn with: the requested one when
    /// permitted, else the rule's default style.
    fn authorize_style(
        &self,
        fact: &AccessFact,
        requested: Option<&str>,
    ) -> Result<Option<String>> {
        match (requested, fact.default_style.as_deref()) {
            (Some(style), _) => {
                check_style_allowed(fact, style)?;
                Ok(Some(style.to_string()))
            }
            (None, Some(default)) => {
                if !self.catalog.style_exists(default) {
                    return Err(AccessError::MissingStyle {
                        style: default.to_string(),
                    });
                }
                Ok(Some(default.to_string()))
            }
            (None, None) => Ok(None),
        }
    }

    /// Applies default styles and checks explicit ones on every layer of a
    /// GetMap or GetFeatureInfo. Other requests pass through unchanged.
    pub fn override_map_request(
        &self,
        principal: &Principal,
        context: &RequestContext,
        request: &mut MapRequest,
    ) -> Result<()> {
        if self.is_admin(principal) {
            tracing::debug!("admin level access, not applying default style for this request");
            return Ok(());
        }
        if !Self::is_map_request(context) {
            return Ok(());
        }
        if !request.has_layers && !request.has_sld {
            return Err(AccessError::denied("GetMap POST requests are forbidden"));
        }

        for layer in &mut request.layers {
            if layer.resource.is_none() && !self.config.allow_remote_and_inline_layers {
                return Err(AccessError::denied("remote layers are not allowed"));
            }
            let fact = self.style_fact(principal, context, layer.resource.as_ref())?;
            layer.style = self.authorize_style(&fact, layer.style.as_deref())?;
            tracing::debug!(layer = %layer.name, style = ?layer.style, "authorized map style");
        }
        Ok(())
    }

    /// Expands a GetLegendGraphic target into the layers to draw and checks or
    /// defaults their styles. Unknown names produce no entries.
    pub fn override_legend_request(
        &self,
        principal: &Principal,
        context: &RequestContext,
        request: &LegendRequest,
    ) -> Result<Vec<LegendEntry>> {
        let requested = request.style.as_deref().filter(|style| !style.is_empty());
        let mut entries = Vec::new();
        if let Some(resource) = self.catalog.layer_by_name(&request.layer) {
            entries.push(LegendEntry {
                resource,
                style: requested.map(str::to_string),
            });
        } else if let Some(group) = self.catalog.layer_group_by_name(&request.layer) {
            for (resource, style) in group.expand(requested) {
                entries.push(LegendEntry { resource, style });
            }
        }

        if self.is_admin(principal) || !context.is_service("WMS") {
            return Ok(entries);
        }

        for entry in &mut entries {
            let fact = self.style_fact(principal, context, Some(&entry.resource))?;
            entry.style = self.authorize_style(&fact, entry.style.as_deref())?;
        }
        Ok(entries)
    }
}
