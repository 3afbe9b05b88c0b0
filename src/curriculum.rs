//! Curriculum graph: standards, strands and prerequisite edges keyed by error category.
//!
//! Loaded once at startup (JSON file or the built-in document) and read-only afterwards.
//! Every map keeps document order; the diagnosis router relies on the order of each
//! prerequisite map for its fallback.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::domain::ErrorCategory;
use crate::error::StartupError;

#[derive(Clone, Debug, Serialize)]
pub struct StandardNode {
  pub id: String,
  pub grade: i32,
  pub description: String,
  pub prerequisites: IndexMap<ErrorCategory, String>,
}

/// Navigation grouping only; no routing semantics.
#[derive(Clone, Debug, Serialize)]
pub struct Strand {
  pub id: String,
  pub name: String,
  pub description: String,
  pub standards: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Curriculum {
  nodes: IndexMap<String, StandardNode>,
  strands: IndexMap<String, Strand>,
}

// --- Document schema ---

#[derive(Deserialize)]
struct CurriculumDoc {
  nodes: IndexMap<String, NodeDoc>,
  #[serde(default)]
  strands: IndexMap<String, StrandDoc>,
}

#[derive(Deserialize)]
struct NodeDoc {
  #[serde(default)] id: Option<String>,
  grade: i32,
  #[serde(default)] description: String,
  #[serde(default)] prerequisites: IndexMap<String, String>,
}

#[derive(Deserialize)]
struct StrandDoc {
  name: String,
  #[serde(default)] description: String,
  #[serde(default)] standards: Vec<String>,
}

impl Curriculum {
  /// Read and parse a curriculum JSON file.
  #[instrument(level = "info", skip_all, fields(path = %path.display()))]
  pub fn load(path: &Path) -> Result<Self, StartupError> {
    let text = std::fs::read_to_string(path).map_err(|e| StartupError::CurriculumRead {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;
    Self::from_json_str(&text, &path.display().to_string())
  }

  /// Parse a curriculum document. `origin` only labels log lines and errors.
  pub fn from_json_str(text: &str, origin: &str) -> Result<Self, StartupError> {
    let doc: CurriculumDoc = serde_json::from_str(text).map_err(|e| StartupError::CurriculumParse {
      origin: origin.to_string(),
      message: e.to_string(),
    })?;
    Ok(Self::from_doc(doc, origin))
  }

  fn from_doc(doc: CurriculumDoc, origin: &str) -> Self {
    let mut nodes = IndexMap::with_capacity(doc.nodes.len());
    for (key, nd) in doc.nodes {
      if let Some(inner) = nd.id.as_deref() {
        if inner != key {
          warn!(target: "curriculum", %key, %inner, "Node id differs from its key; using the key");
        }
      }
      let mut prerequisites = IndexMap::new();
      for (raw_cat, target) in nd.prerequisites {
        match ErrorCategory::parse(&raw_cat) {
          Some(cat) => {
            prerequisites.entry(cat).or_insert(target);
          }
          None => warn!(target: "curriculum", node = %key, category = %raw_cat, "Dropping prerequisite with unknown error category"),
        }
      }
      nodes.insert(
        key.clone(),
        StandardNode { id: key, grade: nd.grade, description: nd.description, prerequisites },
      );
    }

    let strands = doc
      .strands
      .into_iter()
      .map(|(id, sd)| {
        let strand = Strand { id: id.clone(), name: sd.name, description: sd.description, standards: sd.standards };
        (id, strand)
      })
      .collect();

    let graph = Self { nodes, strands };
    graph.report_dangling();
    info!(target: "curriculum", %origin, nodes = graph.nodes.len(), strands = graph.strands.len(), "Curriculum loaded");
    graph
  }

  /// Dangling references are legal (lookup miss = no route); surface them once at load.
  fn report_dangling(&self) {
    for node in self.nodes.values() {
      for (cat, target) in &node.prerequisites {
        if !self.nodes.contains_key(target) {
          warn!(target: "curriculum", node = %node.id, category = %cat, %target, "Prerequisite points at an unknown standard");
        }
      }
    }
    for strand in self.strands.values() {
      for sid in &strand.standards {
        if !self.nodes.contains_key(sid) {
          warn!(target: "curriculum", strand = %strand.id, standard = %sid, "Strand lists an unknown standard");
        }
      }
    }
  }

  pub fn lookup(&self, id: &str) -> Option<&StandardNode> {
    self.nodes.get(id)
  }

  pub fn contains(&self, id: &str) -> bool {
    self.nodes.contains_key(id)
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn strands(&self) -> impl Iterator<Item = &Strand> {
    self.strands.values()
  }

  pub fn strand(&self, id: &str) -> Option<&Strand> {
    self.strands.get(id)
  }

  /// Progression ladder: descending grade, ties in listed order. Unknown ids are skipped.
  pub fn strand_members(&self, strand_id: &str) -> Vec<&StandardNode> {
    let Some(strand) = self.strands.get(strand_id) else {
      return Vec::new();
    };
    let mut members: Vec<&StandardNode> = strand.standards.iter().filter_map(|sid| self.nodes.get(sid)).collect();
    members.sort_by(|a, b| b.grade.cmp(&a.grade));
    members
  }

  /// "Unlocks": every node listing `id` as a prerequisite target. Linear scan, graph order.
  pub fn descendants_of(&self, id: &str) -> Vec<&StandardNode> {
    self
      .nodes
      .values()
      .filter(|n| n.prerequisites.values().any(|target| target == id))
      .collect()
  }

  /// Resolved prerequisites of `id` for the alignment map; dangling targets are skipped.
  pub fn prerequisites_of(&self, id: &str) -> Vec<(ErrorCategory, &StandardNode)> {
    let Some(node) = self.nodes.get(id) else {
      return Vec::new();
    };
    node
      .prerequisites
      .iter()
      .filter_map(|(cat, target)| self.nodes.get(target).map(|n| (*cat, n)))
      .collect()
  }
}
