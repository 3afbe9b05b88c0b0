//! Built-in content: the default curriculum and the fail-soft sentinels the
//! provider adapter returns when the model cannot produce something usable.

use indexmap::IndexMap;
use uuid::Uuid;

use crate::domain::{Diagnosis, ErrorCategory, Question};

/// Grade 6-8 slice of the Common Core math standards.
/// Used when CURRICULUM_PATH is not set, so the app is useful without external files.
pub const BUILTIN_CURRICULUM: &str = r#"{
  "nodes": {
    "6.NS.B.3": {"id": "6.NS.B.3", "grade": 6, "description": "Fluently add, subtract, multiply, and divide multi-digit decimals using the standard algorithm", "prerequisites": {}},
    "6.NS.C.5": {"id": "6.NS.C.5", "grade": 6, "description": "Understand that positive and negative numbers describe quantities having opposite directions or values", "prerequisites": {}},
    "6.RP.A.3": {"id": "6.RP.A.3", "grade": 6, "description": "Use ratio and rate reasoning to solve real-world and mathematical problems", "prerequisites": {"ARITHMETIC": "6.NS.B.3"}},
    "6.EE.A.2": {"id": "6.EE.A.2", "grade": 6, "description": "Write, read, and evaluate expressions in which letters stand for numbers", "prerequisites": {"ARITHMETIC": "6.NS.B.3"}},
    "6.EE.B.7": {"id": "6.EE.B.7", "grade": 6, "description": "Solve real-world problems by writing and solving equations of the form x + p = q and px = q", "prerequisites": {"CONCEPTUAL": "6.EE.A.2", "ARITHMETIC": "6.NS.B.3"}},
    "6.G.A.1": {"id": "6.G.A.1", "grade": 6, "description": "Find the area of right triangles, other triangles, special quadrilaterals, and polygons", "prerequisites": {"ARITHMETIC": "6.NS.B.3"}},
    "7.NS.A.1": {"id": "7.NS.A.1", "grade": 7, "description": "Apply properties of operations to add and subtract rational numbers", "prerequisites": {"CONCEPTUAL": "6.NS.C.5", "ARITHMETIC": "6.NS.B.3"}},
    "7.RP.A.2": {"id": "7.RP.A.2", "grade": 7, "description": "Recognize and represent proportional relationships between quantities", "prerequisites": {"CONCEPTUAL": "6.RP.A.3", "GRAPHICAL": "6.RP.A.3", "ARITHMETIC": "6.NS.B.3"}},
    "7.EE.A.1": {"id": "7.EE.A.1", "grade": 7, "description": "Apply properties of operations to add, subtract, factor, and expand linear expressions", "prerequisites": {"ALGEBRAIC": "6.EE.A.2", "ARITHMETIC": "7.NS.A.1"}},
    "7.EE.B.4a": {"id": "7.EE.B.4a", "grade": 7, "description": "Solve word problems leading to equations of the form px + q = r and p(x + q) = r", "prerequisites": {"ARITHMETIC": "6.NS.B.3", "ALGEBRAIC": "6.EE.B.7", "SKILL": "7.EE.A.1"}},
    "7.G.B.4": {"id": "7.G.B.4", "grade": 7, "description": "Know the formulas for the area and circumference of a circle and use them to solve problems", "prerequisites": {"GEOMETRIC": "6.G.A.1", "ARITHMETIC": "6.NS.B.3"}},
    "7.G.B.6": {"id": "7.G.B.6", "grade": 7, "description": "Solve problems involving area, volume and surface area of two- and three-dimensional objects", "prerequisites": {"GEOMETRIC": "6.G.A.1", "ARITHMETIC": "7.NS.A.1"}},
    "8.EE.B.5": {"id": "8.EE.B.5", "grade": 8, "description": "Graph proportional relationships, interpreting the unit rate as the slope of the graph", "prerequisites": {"CONCEPTUAL": "7.RP.A.2", "GRAPHICAL": "7.RP.A.2"}},
    "8.EE.C.7": {"id": "8.EE.C.7", "grade": 8, "description": "Solve linear equations in one variable", "prerequisites": {"ALGEBRAIC": "7.EE.B.4a", "SKILL": "7.EE.A.1", "ARITHMETIC": "7.NS.A.1"}},
    "8.F.A.1": {"id": "8.F.A.1", "grade": 8, "description": "Understand that a function is a rule that assigns to each input exactly one output", "prerequisites": {"CONCEPTUAL": "6.EE.A.2", "GRAPHICAL": "8.EE.B.5"}},
    "8.F.B.4": {"id": "8.F.B.4", "grade": 8, "description": "Construct a function to model a linear relationship between two quantities", "prerequisites": {"ALGEBRAIC": "8.EE.C.7", "GRAPHICAL": "8.EE.B.5", "CONCEPTUAL": "8.F.A.1", "ARITHMETIC": "7.NS.A.1"}},
    "8.G.B.7": {"id": "8.G.B.7", "grade": 8, "description": "Apply the Pythagorean Theorem to determine unknown side lengths in right triangles", "prerequisites": {"GEOMETRIC": "7.G.B.6", "ARITHMETIC": "6.NS.B.3"}}
  },
  "strands": {
    "EE": {"name": "Expressions & Equations", "description": "From evaluating expressions to solving linear equations in one variable.",
           "standards": ["6.EE.A.2", "6.EE.B.7", "7.EE.A.1", "7.EE.B.4a", "8.EE.B.5", "8.EE.C.7"]},
    "F": {"name": "Functions & Proportionality", "description": "Ratios and proportional relationships building toward linear functions.",
          "standards": ["6.RP.A.3", "7.RP.A.2", "8.F.A.1", "8.F.B.4"]},
    "NS": {"name": "The Number System", "description": "Fluency with decimals, signed numbers and rational arithmetic.",
           "standards": ["6.NS.B.3", "6.NS.C.5", "7.NS.A.1"]},
    "G": {"name": "Geometry", "description": "Area, circles, volume and the Pythagorean Theorem.",
          "standards": ["6.G.A.1", "7.G.B.4", "7.G.B.6", "8.G.B.7"]}
  }
}"#;

pub const SENTINEL_OPTION: &str = "Error";
pub const FALLBACK_HINT: &str = "Review the properties of operations and try again.";
pub const FALLBACK_EXPLANATION: &str = "The error could not be classified automatically; defaulting to Conceptual.";

/// Shape-valid stand-in when question generation fails. Its only option is also the
/// correct answer, so submitting it scores as correct.
pub fn sentinel_question(detail: impl Into<String>) -> Question {
  let mut analysis = IndexMap::new();
  analysis.insert(SENTINEL_OPTION.to_string(), detail.into());
  Question {
    id: Uuid::new_v4(),
    question_text: "Error generating question. Please try again or pick another standard.".into(),
    options: vec![SENTINEL_OPTION.to_string()],
    correct_answer: SENTINEL_OPTION.to_string(),
    analysis,
  }
}

pub fn fallback_diagnosis() -> Diagnosis {
  Diagnosis { error_category: ErrorCategory::Conceptual, explanation: FALLBACK_EXPLANATION.into() }
}
