//! Error types: fatal startup conditions and rejected session transitions.

use std::path::PathBuf;

/// Conditions that stop the process before any session is served.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
  #[error("OPENAI_API_KEY is not set\n\nSuggestion: export OPENAI_API_KEY=<key> (and OPENAI_BASE_URL for a compatible endpoint) before starting the server")]
  MissingApiKey,

  #[error("Failed to build HTTP client for the content provider: {0}")]
  HttpClient(String),

  #[error("Cannot read curriculum '{path}': {message}\n\nSuggestion: check CURRICULUM_PATH or unset it to use the built-in curriculum")]
  CurriculumRead { path: PathBuf, message: String },

  #[error("Invalid curriculum JSON in '{origin}': {message}\n\nSuggestion: the document needs top-level `nodes` and `strands` objects")]
  CurriculumParse { origin: String, message: String },

  #[error("Default standard '{id}' is not in the curriculum\n\nSuggestion: set [tutor].default_standard or DEFAULT_STANDARD to an existing standard id")]
  UnknownDefaultStandard { id: String },
}

/// A session event that was not applied. State is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
  #[error("cannot {action} while {phase}")]
  WrongPhase { action: &'static str, phase: &'static str },

  #[error("unknown standard '{0}'")]
  UnknownStandard(String),

  #[error("no prerequisite to route to from '{0}'")]
  NoGapRoute(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn startup_messages_are_actionable() {
    let msg = StartupError::MissingApiKey.to_string();
    assert!(msg.contains("OPENAI_API_KEY"));
    assert!(msg.contains("Suggestion"));

    let msg = StartupError::UnknownDefaultStandard { id: "9.X.1".into() }.to_string();
    assert!(msg.contains("9.X.1"));
  }

  #[test]
  fn rejection_display() {
    let r = Rejection::WrongPhase { action: "advance", phase: "awaiting_answer" };
    assert_eq!(r.to_string(), "cannot advance while awaiting_answer");
  }
}
