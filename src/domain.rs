//! Domain models: error categories, generated questions, diagnoses and session mode.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why did the student get it wrong? Closed set; anything else coerces to `Conceptual`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
  Arithmetic,
  Conceptual,
  Algebraic,
  Skill,
  Graphical,
  Geometric,
}

impl ErrorCategory {
  pub const ALL: [ErrorCategory; 6] = [
    ErrorCategory::Arithmetic,
    ErrorCategory::Conceptual,
    ErrorCategory::Algebraic,
    ErrorCategory::Skill,
    ErrorCategory::Graphical,
    ErrorCategory::Geometric,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ErrorCategory::Arithmetic => "ARITHMETIC",
      ErrorCategory::Conceptual => "CONCEPTUAL",
      ErrorCategory::Algebraic => "ALGEBRAIC",
      ErrorCategory::Skill => "SKILL",
      ErrorCategory::Graphical => "GRAPHICAL",
      ErrorCategory::Geometric => "GEOMETRIC",
    }
  }

  /// Strict parse (trimmed, case-insensitive). Used for curriculum keys.
  pub fn parse(raw: &str) -> Option<Self> {
    let wanted = raw.trim();
    Self::ALL.into_iter().find(|c| c.as_str().eq_ignore_ascii_case(wanted))
  }

  /// Lenient parse for provider output: unknown or missing means `Conceptual`.
  pub fn coerce(raw: Option<&str>) -> Self {
    raw.and_then(Self::parse).unwrap_or(ErrorCategory::Conceptual)
  }
}

impl std::fmt::Display for ErrorCategory {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One generated multiple-choice item. Opaque once built by the provider adapter.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Question {
  pub id: Uuid,
  pub question_text: String,
  pub options: Vec<String>,
  pub correct_answer: String,
  /// option -> misconception; usually lacks the correct option
  #[serde(default)]
  pub analysis: IndexMap<String, String>,
}

impl Question {
  /// Exact string equality, no normalization and no partial credit.
  /// A `correct_answer` that is not among the options simply never matches a forced choice.
  pub fn is_correct(&self, answer: &str) -> bool {
    answer == self.correct_answer
  }
}

/// Classified wrong answer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnosis {
  pub error_category: ErrorCategory,
  pub explanation: String,
}

/// Scaffolding signal handed to question generation while remediating.
pub type ErrorContext = Diagnosis;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
  #[default]
  Assessment,
  Remediation,
}
