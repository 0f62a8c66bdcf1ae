//! In-memory collaborators shared by the integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use geoaccess_core::{
    AccessFact, AccessManager, AccessManagerConfig, Catalog, ContainmentIndex, FilterValue,
    LayerGroupDef, LayerGroupRef, ResourceRef, Result, RuleQuery, RuleReader,
};

/// One stored rule. `None` fields match anything; first match wins.
#[derive(Debug, Clone)]
pub struct Rule {
    pub role: Option<String>,
    pub workspace: Option<String>,
    pub layer: Option<String>,
    pub fact: AccessFact,
}

impl Rule {
    pub fn any(fact: AccessFact) -> Self {
        Self {
            role: None,
            workspace: None,
            layer: None,
            fact,
        }
    }

    pub fn role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    pub fn workspace(mut self, workspace: &str) -> Self {
        self.workspace = Some(workspace.to_string());
        self
    }

    pub fn layer(mut self, layer: &str) -> Self {
        self.layer = Some(layer.to_string());
        self
    }

    fn matches(&self, query: &RuleQuery) -> bool {
        field_matches(self.role.as_deref(), &query.role)
            && field_matches(self.workspace.as_deref(), &query.workspace)
            && field_matches(self.layer.as_deref(), &query.layer)
    }
}

fn field_matches(rule: Option<&str>, query: &FilterValue) -> bool {
    match (rule, query) {
        (None, _) | (Some(_), FilterValue::Any) => true,
        (Some(_), FilterValue::Default) => false,
        (Some(expected), FilterValue::Value(value)) => value.split(',').any(|v| v == expected),
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRules {
    rules: Vec<Rule>,
    queries: Mutex<Vec<RuleQuery>>,
}

impl InMemoryRules {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<RuleQuery> {
        self.queries.lock().unwrap().clone()
    }

    fn find(&self, query: &RuleQuery) -> AccessFact {
        self.queries.lock().unwrap().push(query.clone());
        self.rules
            .iter()
            .find(|rule| rule.matches(query))
            .map_or_else(AccessFact::deny_all, |rule| rule.fact.clone())
    }
}

impl RuleReader for InMemoryRules {
    fn access_info(&self, query: &RuleQuery) -> Result<AccessFact> {
        Ok(self.find(query))
    }

    fn admin_authorization(&self, query: &RuleQuery) -> Result<AccessFact> {
        Ok(self.find(query))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    pub styles: BTreeSet<String>,
    pub layers: BTreeMap<String, ResourceRef>,
    pub groups: BTreeMap<String, LayerGroupDef>,
}

impl InMemoryCatalog {
    pub fn with_style(mut self, name: &str) -> Self {
        self.styles.insert(name.to_string());
        self
    }

    pub fn with_layer(mut self, resource: ResourceRef) -> Self {
        self.layers.insert(resource.prefixed_name(), resource);
        self
    }

    pub fn with_group(mut self, group: LayerGroupDef) -> Self {
        self.groups.insert(group.group.name.clone(), group);
        self
    }
}

impl Catalog for InMemoryCatalog {
    fn style_exists(&self, name: &str) -> bool {
        self.styles.contains(name)
    }

    fn layer_by_name(&self, name: &str) -> Option<ResourceRef> {
        self.layers.get(name).cloned().or_else(|| {
            self.layers
                .values()
                .find(|resource| resource.name == name)
                .cloned()
        })
    }

    fn layer_group_by_name(&self, name: &str) -> Option<LayerGroupDef> {
        self.groups.get(name).cloned()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryContainment {
    containers: BTreeMap<String, Vec<LayerGroupRef>>,
}

impl InMemoryContainment {
    pub fn with(mut self, resource: &ResourceRef, groups: Vec<LayerGroupRef>) -> Self {
        self.containers.insert(resource.prefixed_name(), groups);
        self
    }
}

impl ContainmentIndex for InMemoryContainment {
    fn containers_of(&self, resource: &ResourceRef) -> Vec<LayerGroupRef> {
        self.containers
            .get(&resource.prefixed_name())
            .cloned()
            .unwrap_or_default()
    }
}

pub const P1: &str = "POLYGON((0 0, 4 0, 4 4, 0 4, 0 0))";
pub const P2: &str = "POLYGON((2 2, 6 2, 6 6, 2 6, 2 2))";

pub fn manager(
    rules: Arc<InMemoryRules>,
    catalog: InMemoryCatalog,
    containment: InMemoryContainment,
    config: AccessManagerConfig,
) -> AccessManager {
    AccessManager::new(rules, Arc::new(catalog), config)
        .with_containment_index(Arc::new(containment))
}
