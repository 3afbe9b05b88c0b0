//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! `Tutor` is the side-effecting shell around the pure session machine: it checks
//! that a command is valid in the current phase, calls the content provider only
//! when needed, then feeds the provider's result into `session::apply`.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::config::TutorSettings;
use crate::curriculum::Curriculum;
use crate::error::Rejection;
use crate::provider::ContentProvider;
use crate::session::{apply, Effect, Event, Phase, Rules, SessionState};

/// Inbound events from the presentation layer.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
  SelectStandard {
    #[serde(rename = "standardId")]
    standard_id: String,
  },
  RequestQuestion,
  SubmitAnswer {
    answer: String,
  },
  RequestHint,
  Advance,
  Retry,
  FixGap,
  Reset,
}

#[derive(Clone)]
pub struct Tutor {
  pub graph: Arc<Curriculum>,
  pub provider: Arc<dyn ContentProvider>,
  pub settings: TutorSettings,
}

impl Tutor {
  pub fn new(graph: Arc<Curriculum>, provider: Arc<dyn ContentProvider>, settings: TutorSettings) -> Self {
    Self { graph, provider, settings }
  }

  pub fn rules(&self) -> Rules<'_> {
    Rules {
      graph: &self.graph,
      policy: self.settings.routing,
      default_standard: &self.settings.default_standard,
    }
  }

  pub fn new_session(&self) -> SessionState {
    SessionState::new(&self.settings.default_standard)
  }

  /// Handle one command to completion. With `auto_generate`, a transition that lands
  /// in AwaitingQuestion is followed by a question request in the same call.
  #[instrument(level = "info", skip(self, state), fields(standard = %state.current_standard_id))]
  pub async fn dispatch(&self, state: &mut SessionState, cmd: Command) -> Vec<Effect> {
    let mut effects = self.handle(state, cmd).await;
    if self.settings.auto_generate && effects.contains(&Effect::QuestionNeeded) {
      effects.retain(|e| e != &Effect::QuestionNeeded);
      effects.extend(self.handle(state, Command::RequestQuestion).await);
    }
    effects
  }

  /// Handle exactly one command. Provider calls happen only for valid commands.
  pub async fn handle(&self, state: &mut SessionState, cmd: Command) -> Vec<Effect> {
    let rules = self.rules();
    let event = match cmd {
      Command::RequestQuestion => {
        if let Err(r) = state.expect_phase(Phase::AwaitingQuestion, "request a question") {
          return rejected(r);
        }
        let Some(node) = self.graph.lookup(&state.current_standard_id) else {
          return rejected(Rejection::UnknownStandard(state.current_standard_id.clone()));
        };
        let question = self
          .provider
          .generate_question(&node.id, &node.description, state.error_context())
          .await;
        info!(target: "session", standard = %node.id, question_id = %question.id, mode = ?state.mode, "Question ready");
        Event::QuestionGenerated(question)
      }

      Command::SubmitAnswer { answer } => {
        if let Err(r) = state.expect_phase(Phase::AwaitingAnswer, "submit an answer") {
          return rejected(r);
        }
        let Some(question) = state.current_question.as_ref() else {
          return rejected(Rejection::WrongPhase { action: "submit an answer", phase: Phase::AwaitingQuestion.as_str() });
        };
        let diagnosis = if question.is_correct(&answer) {
          None
        } else {
          Some(
            self
              .provider
              .diagnose_gap(&question.question_text, &answer, &state.current_standard_id)
              .await,
          )
        };
        info!(target: "session", standard = %state.current_standard_id, correct = diagnosis.is_none(), category = ?diagnosis.as_ref().map(|d| d.error_category), "Answer evaluated");
        Event::AnswerEvaluated { answer, diagnosis }
      }

      Command::RequestHint => {
        if let Err(r) = state.expect_phase(Phase::AwaitingAnswer, "request a hint") {
          return rejected(r);
        }
        let Some(question) = state.current_question.as_ref() else {
          return Vec::new();
        };
        let text = self.provider.generate_hint(&question.question_text).await;
        debug!(target: "session", hint_len = text.len(), "Hint served");
        return vec![Effect::Hint(text)];
      }

      Command::SelectStandard { standard_id } => Event::Navigate(standard_id),
      Command::Advance => Event::Advance,
      Command::Retry => Event::Retry,
      Command::FixGap => Event::FixGap,
      Command::Reset => Event::Reset,
    };

    let (next, effects) = apply(state, event, &rules);
    *state = next;
    effects
  }
}

fn rejected(r: Rejection) -> Vec<Effect> {
  info!(target: "session", reason = %r, "Command rejected");
  vec![Effect::Rejected(r)]
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  use async_trait::async_trait;
  use indexmap::IndexMap;
  use uuid::Uuid;

  use crate::diagnosis::RoutingPolicy;
  use crate::domain::{Diagnosis, ErrorCategory, ErrorContext, Mode, Question};
  use crate::seeds::sentinel_question;

  /// Scripted provider: fixed questions (correct answer "B"), fixed category, call counters.
  pub(crate) struct FakeProvider {
    pub category: ErrorCategory,
    pub fail_questions: bool,
    pub questions: AtomicUsize,
    pub diagnoses: AtomicUsize,
    pub hints: AtomicUsize,
    pub contexts: Mutex<Vec<Option<ErrorCategory>>>,
  }

  impl FakeProvider {
    pub(crate) fn new(category: ErrorCategory) -> Self {
      Self {
        category,
        fail_questions: false,
        questions: AtomicUsize::new(0),
        diagnoses: AtomicUsize::new(0),
        hints: AtomicUsize::new(0),
        contexts: Mutex::new(Vec::new()),
      }
    }
  }

  #[async_trait]
  impl ContentProvider for FakeProvider {
    async fn generate_question(&self, standard_id: &str, _description: &str, context: Option<&ErrorContext>) -> Question {
      self.questions.fetch_add(1, Ordering::SeqCst);
      self.contexts.lock().unwrap().push(context.map(|c| c.error_category));
      if self.fail_questions {
        return sentinel_question("provider down");
      }
      Question {
        id: Uuid::new_v4(),
        question_text: format!("Question on {standard_id}"),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        correct_answer: "B".into(),
        analysis: IndexMap::from([("A".to_string(), "sign error".to_string())]),
      }
    }

    async fn diagnose_gap(&self, _question_text: &str, _wrong_answer: &str, _standard_id: &str) -> Diagnosis {
      self.diagnoses.fetch_add(1, Ordering::SeqCst);
      Diagnosis { error_category: self.category, explanation: "scripted".into() }
    }

    async fn generate_hint(&self, _question_text: &str) -> String {
      self.hints.fetch_add(1, Ordering::SeqCst);
      "Start by undoing the addition.".into()
    }
  }

  const DOC: &str = r#"{
    "nodes": {
      "7.EE.B.4a": {"grade": 7, "description": "Two-step equations", "prerequisites": {"ARITHMETIC": "6.NS.B.3"}},
      "6.NS.B.3": {"grade": 6, "description": "Decimal operations", "prerequisites": {}}
    },
    "strands": {"EE": {"name": "Expressions & Equations", "standards": ["6.NS.B.3", "7.EE.B.4a"]}}
  }"#;

  pub(crate) fn tutor_with(provider: Arc<FakeProvider>, auto_generate: bool) -> Tutor {
    let graph = Arc::new(Curriculum::from_json_str(DOC, "test").unwrap());
    let settings = TutorSettings {
      default_standard: "7.EE.B.4a".into(),
      routing: RoutingPolicy::Fallback,
      auto_generate,
      show_analysis: false,
    };
    Tutor::new(graph, provider, settings)
  }

  #[tokio::test]
  async fn scenario_d_correct_answer_never_diagnoses() {
    let fake = Arc::new(FakeProvider::new(ErrorCategory::Arithmetic));
    let tutor = tutor_with(fake.clone(), false);
    let mut s = tutor.new_session();
    tutor.handle(&mut s, Command::RequestQuestion).await;
    let effects = tutor.handle(&mut s, Command::SubmitAnswer { answer: "B".into() }).await;
    assert!(effects.is_empty());
    assert_eq!(s.is_correct(), Some(true));
    assert_eq!(fake.diagnoses.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn wrong_answer_diagnoses_once_then_fix_gap_routes() {
    let fake = Arc::new(FakeProvider::new(ErrorCategory::Geometric));
    let tutor = tutor_with(fake.clone(), false);
    let mut s = tutor.new_session();
    tutor.handle(&mut s, Command::RequestQuestion).await;
    tutor.handle(&mut s, Command::SubmitAnswer { answer: "A".into() }).await;
    assert_eq!(fake.diagnoses.load(Ordering::SeqCst), 1);
    assert_eq!(s.last_diagnosis().map(|d| d.error_category), Some(ErrorCategory::Geometric));

    let effects = tutor.handle(&mut s, Command::FixGap).await;
    assert_eq!(effects, vec![Effect::QuestionNeeded]);
    assert_eq!(s.current_standard_id, "6.NS.B.3");
    assert_eq!(s.mode, Mode::Remediation);

    tutor.handle(&mut s, Command::RequestQuestion).await;
    let contexts = fake.contexts.lock().unwrap().clone();
    assert_eq!(contexts, vec![None, Some(ErrorCategory::Geometric)]);
  }

  #[tokio::test]
  async fn scenario_e_sentinel_question_scores_its_error_option() {
    let mut fake = FakeProvider::new(ErrorCategory::Skill);
    fake.fail_questions = true;
    let fake = Arc::new(fake);
    let tutor = tutor_with(fake.clone(), false);
    let mut s = tutor.new_session();
    tutor.handle(&mut s, Command::RequestQuestion).await;
    let q = s.current_question.clone().unwrap();
    assert_eq!(q.options, vec!["Error"]);
    assert_eq!(q.correct_answer, "Error");
    tutor.handle(&mut s, Command::SubmitAnswer { answer: "Error".into() }).await;
    assert_eq!(s.is_correct(), Some(true));
    assert_eq!(fake.diagnoses.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn hint_is_side_channel_only() {
    let fake = Arc::new(FakeProvider::new(ErrorCategory::Skill));
    let tutor = tutor_with(fake.clone(), false);
    let mut s = tutor.new_session();

    let effects = tutor.handle(&mut s, Command::RequestHint).await;
    assert!(matches!(effects.as_slice(), [Effect::Rejected(_)]));
    assert_eq!(fake.hints.load(Ordering::SeqCst), 0);

    tutor.handle(&mut s, Command::RequestQuestion).await;
    let before = s.clone();
    let effects = tutor.handle(&mut s, Command::RequestHint).await;
    assert_eq!(effects, vec![Effect::Hint("Start by undoing the addition.".into())]);
    assert_eq!(s, before);
  }

  #[tokio::test]
  async fn invalid_commands_make_no_provider_calls() {
    let fake = Arc::new(FakeProvider::new(ErrorCategory::Skill));
    let tutor = tutor_with(fake.clone(), false);
    let mut s = tutor.new_session();
    let effects = tutor.handle(&mut s, Command::SubmitAnswer { answer: "B".into() }).await;
    assert!(matches!(effects.as_slice(), [Effect::Rejected(Rejection::WrongPhase { .. })]));

    tutor.handle(&mut s, Command::RequestQuestion).await;
    let effects = tutor.handle(&mut s, Command::RequestQuestion).await;
    assert!(matches!(effects.as_slice(), [Effect::Rejected(_)]));
    assert_eq!(fake.questions.load(Ordering::SeqCst), 1);
    assert_eq!(fake.diagnoses.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn regenerated_questions_are_new_objects() {
    let fake = Arc::new(FakeProvider::new(ErrorCategory::Arithmetic));
    let tutor = tutor_with(fake.clone(), true);
    let mut s = tutor.new_session();
    tutor.dispatch(&mut s, Command::RequestQuestion).await;
    let first = s.current_question.as_ref().map(|q| q.id).unwrap();

    tutor.dispatch(&mut s, Command::SubmitAnswer { answer: "B".into() }).await;
    let effects = tutor.dispatch(&mut s, Command::Advance).await;
    assert!(effects.is_empty());
    let second = s.current_question.as_ref().map(|q| q.id).unwrap();
    assert_ne!(first, second);

    tutor.dispatch(&mut s, Command::SubmitAnswer { answer: "C".into() }).await;
    tutor.dispatch(&mut s, Command::Retry).await;
    let third = s.current_question.as_ref().map(|q| q.id).unwrap();
    assert_ne!(second, third);
    assert_eq!(s.current_standard_id, "7.EE.B.4a");
  }

  #[tokio::test]
  async fn select_standard_and_reset() {
    let fake = Arc::new(FakeProvider::new(ErrorCategory::Arithmetic));
    let tutor = tutor_with(fake.clone(), false);
    let mut s = tutor.new_session();
    let effects = tutor.handle(&mut s, Command::SelectStandard { standard_id: "nope".into() }).await;
    assert_eq!(effects, vec![Effect::Rejected(Rejection::UnknownStandard("nope".into()))]);
    assert_eq!(s.current_standard_id, "7.EE.B.4a");

    tutor.handle(&mut s, Command::SelectStandard { standard_id: "6.NS.B.3".into() }).await;
    assert_eq!(s.current_standard_id, "6.NS.B.3");
    tutor.handle(&mut s, Command::Reset).await;
    assert_eq!(s, tutor.new_session());
  }

  #[test]
  fn commands_deserialize_from_tagged_json() {
    let c: Command = serde_json::from_str(r#"{"type": "select_standard", "standardId": "8.F.B.4"}"#).unwrap();
    assert!(matches!(c, Command::SelectStandard { standard_id } if standard_id == "8.F.B.4"));
    let c: Command = serde_json::from_str(r#"{"type": "fix_gap"}"#).unwrap();
    assert!(matches!(c, Command::FixGap));
  }
}
