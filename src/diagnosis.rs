//! Diagnosis router: picks the prerequisite standard that remedies a classified error.
//!
//! Single-hop lookups only, so cycles in the prerequisite graph never matter here.

use serde::Deserialize;

use crate::curriculum::StandardNode;
use crate::domain::ErrorCategory;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPolicy {
  /// Exact category match, else the first declared prerequisite, else nothing.
  #[default]
  Fallback,
  /// Exact category match or nothing.
  ExactOnly,
}

/// Route a failed `category` on `current` to a prerequisite id.
///
/// `None` means `current` is a foundation node (or, under `ExactOnly`, has no entry
/// for the category). The returned id is not checked against the graph.
pub fn route(current: &StandardNode, category: ErrorCategory, policy: RoutingPolicy) -> Option<&str> {
  if let Some(target) = current.prerequisites.get(&category) {
    return Some(target.as_str());
  }
  match policy {
    RoutingPolicy::Fallback => current.prerequisites.values().next().map(String::as_str),
    RoutingPolicy::ExactOnly => None,
  }
}
