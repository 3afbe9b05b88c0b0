//! Content provider contract and the coercion boundary for its raw payloads.
//!
//! Implementations never fail: every method returns a usable value (a sentinel when
//! the backing model misbehaves). Raw JSON from a model goes through
//! `coerce_question` / `coerce_diagnosis` and nothing loosely shaped leaks past them.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{Diagnosis, ErrorCategory, ErrorContext, Question};
use crate::seeds::{sentinel_question, FALLBACK_EXPLANATION, FALLBACK_HINT};

#[async_trait]
pub trait ContentProvider: Send + Sync {
  /// Build a question for a standard. `context` asks for a simpler, scaffolded item.
  async fn generate_question(&self, standard_id: &str, description: &str, context: Option<&ErrorContext>) -> Question;

  /// Classify why `wrong_answer` is wrong.
  async fn diagnose_gap(&self, question_text: &str, wrong_answer: &str, standard_id: &str) -> Diagnosis;

  /// Advisory text only; never the answer or the option list.
  async fn generate_hint(&self, question_text: &str) -> String;
}

/// Models sometimes wrap the object in a one-element array.
fn unwrap_first(value: Value) -> Value {
  match value {
    Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
    other => other,
  }
}

/// Scalars become strings; anything else is rejected.
fn scalar_to_string(v: &Value) -> Option<String> {
  match v {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

/// Strict `Question` from a raw model payload, or the sentinel with the reason attached.
pub fn coerce_question(raw: Value) -> Question {
  match try_question(unwrap_first(raw)) {
    Ok(q) => {
      if !q.options.iter().any(|o| o == &q.correct_answer) {
        warn!(target: "provider", question_id = %q.id, "correct_answer is not among the options; every submission will score incorrect");
      }
      q
    }
    Err(reason) => {
      warn!(target: "provider", %reason, "Malformed question payload; using sentinel");
      sentinel_question(reason)
    }
  }
}

fn try_question(value: Value) -> Result<Question, String> {
  let kind = json_kind(&value);
  let Value::Object(obj) = value else {
    return Err(format!("expected a JSON object, got {kind}"));
  };

  let question_text = obj
    .get("question_text")
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .ok_or("missing question_text")?
    .to_string();

  let options: Vec<String> = obj
    .get("options")
    .and_then(Value::as_array)
    .ok_or("missing options")?
    .iter()
    .filter_map(scalar_to_string)
    .collect();
  if options.is_empty() {
    return Err("options list is empty".into());
  }

  let correct_answer = obj
    .get("correct_answer")
    .and_then(scalar_to_string)
    .ok_or("missing correct_answer")?;

  let analysis: IndexMap<String, String> = obj
    .get("analysis")
    .and_then(Value::as_object)
    .map(|m| {
      m.iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect()
    })
    .unwrap_or_default();

  Ok(Question { id: Uuid::new_v4(), question_text, options, correct_answer, analysis })
}

fn json_kind(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

/// Strict `Diagnosis` from a raw payload. Accepts `error_category` or the older
/// `error_type` key; anything unrecognized is `Conceptual`.
pub fn coerce_diagnosis(raw: Value) -> Diagnosis {
  let value = unwrap_first(raw);
  let obj = value.as_object();
  let raw_category = obj
    .and_then(|m| m.get("error_category").or_else(|| m.get("error_type")))
    .and_then(Value::as_str);
  let error_category = ErrorCategory::coerce(raw_category);
  if raw_category.and_then(ErrorCategory::parse).is_none() {
    warn!(target: "provider", raw = ?raw_category, "Unrecognized error category; coerced to CONCEPTUAL");
  }
  let explanation = obj
    .and_then(|m| m.get("explanation"))
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .unwrap_or(FALLBACK_EXPLANATION)
    .to_string();
  Diagnosis { error_category, explanation }
}

/// Empty hints are replaced by the generic study tip.
pub fn coerce_hint(raw: &str) -> String {
  let t = raw.trim();
  if t.is_empty() { FALLBACK_HINT.to_string() } else { t.to_string() }
}
