//! # Port-State Filters
//!
//! Composable boolean predicates over a port→role mapping.
//!
//! A reference filter only speaks about the ports it knows: ports missing from
//! the reference state, and ports whose reference role is `Neutral`, impose no
//! requirement. `All`/`Any` combine filters into arbitrary boolean expressions,
//! with `All([]) == true` and `Any([]) == false`.

use crate::{PortId, PortRole};
use std::collections::BTreeMap;

/// Mapping from port to role. Also the shape of a connection line.
pub type PortState = BTreeMap<PortId, PortRole>;

/// A boolean predicate over a [`PortState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Always returns the wrapped value.
    Constant(bool),
    /// Requires matching roles on ports shared with the reference state.
    Reference(PortState),
    /// Logical AND.
    All(Vec<Filter>),
    /// Logical OR.
    Any(Vec<Filter>),
}

impl Filter {
    /// Filter that always returns `value`.
    #[must_use]
    pub const fn constant(value: bool) -> Self {
        Self::Constant(value)
    }

    /// Filter derived from a reference state.
    #[must_use]
    pub fn from_reference(state: PortState) -> Self {
        Self::Reference(state)
    }

    /// Conjunction of `filters`. Empty conjunction validates true.
    #[must_use]
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::All(filters.into_iter().collect())
    }

    /// Disjunction of `filters`. Empty disjunction validates false.
    #[must_use]
    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Any(filters.into_iter().collect())
    }

    /// Evaluate the filter against a candidate state.
    #[must_use]
    pub fn validate(&self, state: &PortState) -> bool {
        match self {
            Self::Constant(value) => *value,
            Self::Reference(reference) => state.iter().all(|(port, role)| {
                match reference.get(port) {
                    None | Some(PortRole::Neutral) => true,
                    Some(required) => required == role,
                }
            }),
            Self::All(filters) => filters.iter().all(|f| f.validate(state)),
            Self::Any(filters) => filters.iter().any(|f| f.validate(state)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
