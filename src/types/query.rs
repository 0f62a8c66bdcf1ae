//! Rule store query keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One field of a [`RuleQuery`].
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterValue {
    /// Matches any value stored in the rule.
    Any,
    /// Matches only rules holding the store's default sentinel.
    #[default]
    Default,
    Value(String),
}

impl FilterValue {
    pub fn value(value: impl Into<String>) -> Self {
        Self::Value(value.into())
    }

    /// `Some(v)` becomes a literal, `None` the default sentinel.
    pub fn or_default<S: Into<String>>(value: Option<S>) -> Self {
        value.map_or(Self::Default, |v| Self::Value(v.into()))
    }

    /// `Some(v)` becomes a literal, `None` the wildcard.
    pub fn or_any<S: Into<String>>(value: Option<S>) -> Self {
        value.map_or(Self::Any, |v| Self::Value(v.into()))
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Self::Value(v) => Some(v),
            Self::Any | Self::Default => None,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Default => f.write_str("<default>"),
            Self::Value(v) => f.write_str(v),
        }
    }
}

/// Key for one rule lookup. Built per (role × target) and consumed once.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash, Default)]
pub struct RuleQuery {
    pub user: FilterValue,
    pub role: FilterValue,
    pub instance: FilterValue,
    pub source_address: FilterValue,
    pub service: FilterValue,
    pub request: FilterValue,
    pub workspace: FilterValue,
    pub layer: FilterValue,
}

impl fmt::Display for RuleQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RuleQuery[user={} role={} instance={} ip={} service={} request={} \
             workspace={} layer={}]",
            self.user,
            self.role,
            self.instance,
            self.source_address,
            self.service,
            self.request,
            self.workspace,
            self.layer
        )
    }
}
