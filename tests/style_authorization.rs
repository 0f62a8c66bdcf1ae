mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{InMemoryCatalog, InMemoryContainment, InMemoryRules, Rule, manager};
use geoaccess_core::{
    AccessError, AccessFact, AccessManager, AccessManagerConfig, ErrorCategory, GroupMode,
    LayerGroupDef, LayerGroupRef, LayerGroupStyle, LegendRequest, MapLayer, MapRequest, Principal,
    RequestContext, ResourceKind, ResourceRef,
};

fn roads() -> ResourceRef {
    ResourceRef::new("topp", "roads", ResourceKind::Vector)
}

fn states() -> ResourceRef {
    ResourceRef::new("topp", "states", ResourceKind::Vector)
}

fn styled(default: Option<&str>, allowed: &[&str]) -> AccessFact {
    let mut fact = AccessFact::allow_all();
    fact.default_style = default.map(str::to_string);
    fact.allowed_styles = allowed.iter().map(|s| (*s).to_string()).collect();
    fact
}

fn getmap() -> RequestContext {
    RequestContext::new("WMS", "GetMap").with_source_address("10.0.0.1")
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::default()
        .with_style("line")
        .with_style("polygon")
        .with_layer(roads())
        .with_layer(states())
        .with_group(
            LayerGroupDef::new(
                LayerGroupRef::new(None, "basemap", GroupMode::Named),
                vec![roads(), states()],
                vec![Some("dashed".to_string()), None],
            )
            .with_group_style(LayerGroupStyle::new(
                "outline",
                vec![states()],
                vec![Some("outline".to_string())],
            )),
        )
}

fn style_manager(config: AccessManagerConfig) -> AccessManager {
    let rules = Arc::new(InMemoryRules::new(vec![
        Rule::any(styled(Some("line"), &["dashed"])).layer("roads"),
        Rule::any(styled(Some("polygon"), &[])).layer("states"),
    ]));
    manager(rules, catalog(), InMemoryContainment::default(), config)
}

fn alice() -> Principal {
    Principal::user("alice", ["R1"])
}

fn request(layers: Vec<MapLayer>) -> MapRequest {
    MapRequest {
        has_layers: true,
        has_sld: false,
        layers,
    }
}

#[test]
fn missing_style_gets_rule_default() {
    let manager = style_manager(AccessManagerConfig::default());
    let mut map = request(vec![
        MapLayer::local(roads(), None),
        MapLayer::local(states(), None),
    ]);
    manager.override_map_request(&alice(), &getmap(), &mut map).unwrap();
    assert_eq!(map.layers[0].style.as_deref(), Some("line"));
    assert_eq!(map.layers[1].style.as_deref(), Some("polygon"));
}

#[test]
fn style_outside_permitted_set_is_rejected() {
    let manager = style_manager(AccessManagerConfig::default());
    let mut map = request(vec![MapLayer::local(roads(), Some("heatmap".to_string()))]);
    let err = manager
        .override_map_request(&alice(), &getmap(), &mut map)
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Authorization);
}

#[test]
fn default_style_is_accepted_without_allowed_styles() {
    let manager = style_manager(AccessManagerConfig::default());
    let mut map = request(vec![
        MapLayer::local(states(), Some("polygon".to_string())),
        MapLayer::local(roads(), Some("dashed".to_string())),
    ]);
    manager.override_map_request(&alice(), &getmap(), &mut map).unwrap();
    assert_eq!(map.layers[0].style.as_deref(), Some("polygon"));
    assert_eq!(map.layers[1].style.as_deref(), Some("dashed"));
}

#[test]
fn getmap_without_layers_or_sld_is_forbidden() {
    let manager = style_manager(AccessManagerConfig::default());
    let mut map = MapRequest::default();
    let err = manager
        .override_map_request(&alice(), &getmap(), &mut map)
        .unwrap_err();
    assert!(err.to_string().contains("POST"), "got {err}");
}

#[test]
fn non_map_requests_pass_through() {
    let manager = style_manager(AccessManagerConfig::default());
    let mut map = MapRequest::default();
    let capabilities = RequestContext::new("WMS", "GetCapabilities");
    manager
        .override_map_request(&alice(), &capabilities, &mut map)
        .unwrap();
}

#[test]
fn admin_requests_are_left_alone() {
    let manager = style_manager(AccessManagerConfig::default());
    let admin = Principal::user("root", ["ADMIN"]);
    let mut map = request(vec![MapLayer::local(roads(), Some("heatmap".to_string()))]);
    manager.override_map_request(&admin, &getmap(), &mut map).unwrap();
    assert_eq!(map.layers[0].style.as_deref(), Some("heatmap"));
}

#[test]
fn remote_layers_need_configuration() {
    let remote = || request(vec![MapLayer::remote("cascaded", None)]);

    let strict = style_manager(AccessManagerConfig::default());
    let err = strict
        .override_map_request(&alice(), &getmap(), &mut remote())
        .unwrap_err();
    assert!(matches!(err, AccessError::Denied { .. }));

    let lenient = style_manager(
        AccessManagerConfig::builder()
            .allow_remote_and_inline_layers(true)
            .build(),
    );
    let mut map = remote();
    lenient.override_map_request(&alice(), &getmap(), &mut map).unwrap();
    // no rule matches an unnamed layer, so nothing is defaulted
    assert_eq!(map.layers[0].style, None);
}

#[test]
fn unknown_default_style_is_a_configuration_error() {
    let rules = Arc::new(InMemoryRules::new(vec![Rule::any(styled(Some("ghost"), &[]))]));
    let manager = manager(
        rules,
        catalog(),
        InMemoryContainment::default(),
        AccessManagerConfig::default(),
    );
    let mut map = request(vec![MapLayer::local(roads(), None)]);
    let err = manager
        .override_map_request(&alice(), &getmap(), &mut map)
        .unwrap_err();
    assert!(matches!(err, AccessError::MissingStyle { ref style } if style == "ghost"));
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn legend_for_group_expands_layers() {
    let manager = style_manager(AccessManagerConfig::default());
    let context = RequestContext::new("WMS", "GetLegendGraphic");
    let entries = manager
        .override_legend_request(&alice(), &context, &LegendRequest::new("basemap", None))
        .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].resource, roads());
    assert_eq!(entries[0].style.as_deref(), Some("dashed"));
    assert_eq!(entries[1].style.as_deref(), Some("polygon"));
}

#[test]
fn legend_for_unknown_name_is_empty() {
    let manager = style_manager(AccessManagerConfig::default());
    let context = RequestContext::new("WMS", "GetLegendGraphic");
    let entries = manager
        .override_legend_request(&alice(), &context, &LegendRequest::new("nowhere", None))
        .unwrap();
    assert!(entries.is_empty());
}

#[test]
fn legend_rejects_forbidden_style() {
    let manager = style_manager(AccessManagerConfig::default());
    let context = RequestContext::new("WMS", "GetLegendGraphic");
    let legend = LegendRequest::new("topp:states", Some("polygon".to_string()));
    let entries = manager
        .override_legend_request(&alice(), &context, &legend)
        .unwrap();
    assert_eq!(entries[0].style.as_deref(), Some("polygon"));

    let legend = LegendRequest::new("topp:roads", Some("polygon".to_string()));
    let err = manager
        .override_legend_request(&alice(), &context, &legend)
        .unwrap_err();
    assert!(err.to_string().contains("'polygon'"));
}

#[test]
fn map_request_from_kvp() {
    let kvp: BTreeMap<String, String> = [
        ("layers", "topp:roads,basemap"),
        ("Styles", "line,"),
        ("format", "image/png"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let map = MapRequest::from_kvp(&kvp, &catalog()).unwrap();
    assert!(map.has_layers);
    assert!(!map.has_sld);
    let names: Vec<&str> = map.layers.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["topp:roads", "topp:roads", "topp:states"]);
    assert_eq!(map.layers[0].style.as_deref(), Some("line"));
    assert_eq!(map.layers[1].style.as_deref(), Some("dashed"));
    assert_eq!(map.layers[2].style, None);
}

#[test]
fn map_request_with_unknown_layer_fails() {
    let kvp: BTreeMap<String, String> =
        [("LAYERS".to_string(), "nowhere".to_string())].into_iter().collect();
    let err = MapRequest::from_kvp(&kvp, &catalog()).unwrap_err();
    assert!(matches!(err, AccessError::Configuration { .. }));
}

#[test]
fn map_request_selects_group_style() {
    let kvp: BTreeMap<String, String> = [("LAYERS", "basemap"), ("STYLES", "outline")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let map = MapRequest::from_kvp(&kvp, &catalog()).unwrap();
    assert_eq!(map.layers, vec![MapLayer::local(states(), Some("outline".to_string()))]);
}

#[test]
fn group_style_layers_are_authorized() {
    let manager = style_manager(AccessManagerConfig::default());
    let kvp: BTreeMap<String, String> = [("LAYERS", "basemap"), ("STYLES", "outline")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let mut map = MapRequest::from_kvp(&kvp, &catalog()).unwrap();

    // states only permits its default style
    let err = manager
        .override_map_request(&alice(), &getmap(), &mut map)
        .unwrap_err();
    assert!(err.to_string().contains("'outline'"), "got {err}");
}

#[test]
fn legend_selects_group_style() {
    let manager = style_manager(AccessManagerConfig::default());
    let context = RequestContext::new("WMS", "GetLegendGraphic");
    let legend = LegendRequest::new("basemap", Some("outline".to_string()));
    let admin = Principal::user("root", ["ADMIN"]);
    let entries = manager
        .override_legend_request(&admin, &context, &legend)
        .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].resource, states());
    assert_eq!(entries[0].style.as_deref(), Some("outline"));
}

#[test]
fn legend_with_unknown_group_style_uses_default_layers() {
    let manager = style_manager(AccessManagerConfig::default());
    let context = RequestContext::new("WMS", "GetLegendGraphic");
    let legend = LegendRequest::new("basemap", Some("sepia".to_string()));
    let entries = manager
        .override_legend_request(&alice(), &context, &legend)
        .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].style.as_deref(), Some("dashed"));
    assert_eq!(entries[1].style.as_deref(), Some("polygon"));
}
