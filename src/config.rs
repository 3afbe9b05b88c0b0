//! Loading agent configuration (prompts + tutor settings) from TOML.
//!
//! See `AgentConfig`, `Prompts` and `TutorSettings` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::diagnosis::RoutingPolicy;

pub const DEFAULT_STANDARD: &str = "8.F.B.4";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub tutor: TutorSettings,
  #[serde(default)]
  pub sessions: SessionLimits,
}

/// Bounds on the in-memory HTTP session store.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionLimits {
  /// Sessions untouched for this long are dropped by the sweeper.
  pub idle_ttl_secs: u64,
  /// At capacity, creating a session evicts the least recently touched one.
  pub max_sessions: usize,
  pub sweep_interval_secs: u64,
}

impl Default for SessionLimits {
  fn default() -> Self {
    Self { idle_ttl_secs: 30 * 60, max_sessions: 10_000, sweep_interval_secs: 60 }
  }
}

/// Session behavior knobs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TutorSettings {
  /// Where every new (or reset) session starts.
  pub default_standard: String,
  /// `fallback` (default) or `exact_only`.
  pub routing: RoutingPolicy,
  /// Generate a question as soon as a session lands in AwaitingQuestion.
  pub auto_generate: bool,
  /// Expose per-option misconception analysis to clients (teacher/debug view).
  pub show_analysis: bool,
}

impl Default for TutorSettings {
  fn default() -> Self {
    Self {
      default_standard: DEFAULT_STANDARD.into(),
      routing: RoutingPolicy::Fallback,
      auto_generate: true,
      show_analysis: false,
    }
  }
}

/// Prompts used by the OpenAI-backed content provider.
/// Placeholders are `{name}` and filled by `util::fill_template`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Question generation: {standard_id}, {description}, {context}
  pub question_system: String,
  pub question_user_template: String,
  pub scaffold_context_template: String,
  pub standard_context: String,
  // Diagnosis: {standard_id}, {question_text}, {wrong_answer}
  pub diagnosis_system: String,
  pub diagnosis_user_template: String,
  // Hint: {question_text}
  pub hint_system: String,
  pub hint_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      question_system: "You are a middle-school math content generator. Respond ONLY with strict JSON.".into(),
      question_user_template: "Create a 7th-grade math word problem for Standard: {standard_id} - {description}.\n\nCONTEXT:\n- Theme: Space Exploration, Video Games, or Sports.\n- {context}\n\nFORMATTING RULES:\n- Use LaTeX for all math expressions (enclose in single dollar signs, e.g., $x^2 + 5$).\n\nReturn JSON: {\"question_text\": string, \"correct_answer\": string, \"options\": [4 strings, one equal to correct_answer], \"analysis\": {\"<wrong option>\": \"specific misconception\"}}".into(),
      scaffold_context_template: "PREVIOUS ERROR: Student failed due to {category} ({explanation}). Make this question simpler (scaffolding).".into(),
      standard_context: "Difficulty: Medium.".into(),
      diagnosis_system: "You are a math teacher diagnosing student errors. Reply as compact JSON.".into(),
      diagnosis_user_template: "Task: Diagnose the student's error.\nStandard: {standard_id}\nQuestion: {question_text}\nStudent Answer: {wrong_answer}\n\nDecide which category best describes the error:\n1. 'ARITHMETIC' - Calculation error, integer/decimal mistake, sign error\n2. 'CONCEPTUAL' - Misunderstanding the core concept, wrong formula, logic error\n3. 'ALGEBRAIC' - Equation manipulation error, variable isolation mistake, slope/intercept confusion\n4. 'SKILL' - Procedural error, missing a step, applying wrong procedure\n5. 'GRAPHICAL' - Misreading or plotting graphs incorrectly, coordinate errors\n6. 'GEOMETRIC' - Shape/angle misconception, area/perimeter confusion, spatial reasoning error\n\nReturn JSON {\"error_category\": one of the names above, \"explanation\": \"Brief explanation for the teacher.\"}".into(),
      hint_system: "You are a helpful tutor. Keep hints short. Do NOT solve the problem, do NOT give the answer and do NOT list the options.".into(),
      hint_user_template: "The student is stuck on this problem:\n\"{question_text}\"\n\nGive only the first conceptual step as a concise hint. Use LaTeX for math (e.g., $x^2$).".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
/// Read and parse a TOML config. Failures are logged and yield `None` (callers use defaults).
pub fn load_agent_config(path: &str) -> Option<AgentConfig> {
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_agent_config(&s) {
      Ok(cfg) => {
        info!(target: "mathnav_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "mathnav_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "mathnav_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_agent_config(text: &str) -> Result<AgentConfig, toml::de::Error> {
  toml::from_str::<AgentConfig>(text)
}
