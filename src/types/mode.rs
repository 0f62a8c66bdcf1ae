//! Catalog visibility modes and their two merge orderings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a denied resource shows up in the catalog.
///
/// - `hide`: omitted from capabilities and listings.
/// - `mixed`: listed, but a direct access challenges for credentials.
/// - `challenge`: listed, every access challenges for credentials.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CatalogMode {
    #[default]
    Hide,
    Mixed,
    Challenge,
}

impl CatalogMode {
    /// Merge used while restricting (same role, resource and its groups):
    /// `Hide` wins over anything, then `Mixed` over `Challenge`.
    #[must_use]
    pub fn stricter(self, other: Self) -> Self {
        match (self, other) {
            (Self::Hide, _) | (_, Self::Hide) => Self::Hide,
            (Self::Mixed, _) | (_, Self::Mixed) => Self::Mixed,
            _ => Self::Challenge,
        }
    }

    /// Merge used while enlarging (across roles and buckets):
    /// `Challenge` wins over anything, then `Mixed` over `Hide`.
    #[must_use]
    pub fn larger(self, other: Self) -> Self {
        match (self, other) {
            (Self::Challenge, _) | (_, Self::Challenge) => Self::Challenge,
            (Self::Mixed, _) | (_, Self::Mixed) => Self::Mixed,
            _ => Self::Hide,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hide => "HIDE",
            Self::Mixed => "MIXED",
            Self::Challenge => "CHALLENGE",
        }
    }
}

impl fmt::Display for CatalogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_mode() -> impl Strategy<Value = CatalogMode> {
        prop_oneof![
            Just(CatalogMode::Hide),
            Just(CatalogMode::Mixed),
            Just(CatalogMode::Challenge),
        ]
    }

    #[test]
    fn stricter_orders_hide_mixed_challenge() {
        assert_eq!(
            CatalogMode::Mixed.stricter(CatalogMode::Challenge),
            CatalogMode::Mixed
        );
        assert_eq!(
            CatalogMode::Challenge.stricter(CatalogMode::Challenge),
            CatalogMode::Challenge
        );
    }

    #[test]
    fn larger_orders_challenge_mixed_hide() {
        assert_eq!(CatalogMode::Hide.larger(CatalogMode::Mixed), CatalogMode::Mixed);
        assert_eq!(CatalogMode::Hide.larger(CatalogMode::Hide), CatalogMode::Hide);
    }

    #[test]
    fn serializes_upper_case() {
        let json = serde_json::to_string(&CatalogMode::Challenge).unwrap();
        assert_eq!(json, "\"CHALLENGE\"");
    }

    proptest! {
        #[test]
        fn hide_dominates_stricter(x in any_mode()) {
            prop_assert_eq!(CatalogMode::Hide.stricter(x), CatalogMode::Hide);
            prop_assert_eq!(x.stricter(CatalogMode::Hide), CatalogMode::Hide);
        }

        #[test]
        fn challenge_dominates_larger(x in any_mode()) {
            prop_assert_eq!(CatalogMode::Challenge.larger(x), CatalogMode::Challenge);
            prop_assert_eq!(x.larger(CatalogMode::Challenge), CatalogMode::Challenge);
        }

        #[test]
        fn both_merges_commute(a in any_mode(), b in any_mode()) {
            prop_assert_eq!(a.stricter(b), b.stricter(a));
            prop_assert_eq!(a.larger(b), b.larger(a));
        }

        #[test]
        fn both_merges_are_idempotent(a in any_mode()) {
            prop_assert_eq!(a.stricter(a), a);
            prop_assert_eq!(a.larger(a), a);
        }
    }
}
