//! Session state machine (pure part).
//!
//! `apply(state, event, rules)` returns the next state plus outbound effects and never
//! performs I/O. Provider results enter as event payloads; the async shell in
//! `logic` is the only caller that talks to the content provider.
//!
//! Phases:
//!   AwaitingQuestion -> AwaitingAnswer -> AnsweredCorrect | AnsweredIncorrect
//!   AnsweredCorrect   --advance-->  AwaitingQuestion (same standard)
//!   AnsweredIncorrect --retry-->    AwaitingQuestion (same standard)
//!   AnsweredIncorrect --fix_gap-->  AwaitingQuestion (routed standard, REMEDIATION)
//!   any               --navigate--> AwaitingQuestion (target standard, mode kept)
//!   any               --reset-->    AwaitingQuestion (default standard, ASSESSMENT)

use serde::Serialize;
use tracing::{debug, info};

use crate::curriculum::{Curriculum, StandardNode};
use crate::diagnosis::{route, RoutingPolicy};
use crate::domain::{Diagnosis, ErrorContext, Mode, Question};
use crate::error::Rejection;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  AwaitingQuestion,
  AwaitingAnswer,
  AnsweredCorrect,
  AnsweredIncorrect,
}

impl Phase {
  pub fn as_str(&self) -> &'static str {
    match self {
      Phase::AwaitingQuestion => "awaiting_question",
      Phase::AwaitingAnswer => "awaiting_answer",
      Phase::AnsweredCorrect => "answered_correct",
      Phase::AnsweredIncorrect => "answered_incorrect",
    }
  }
}

/// Evaluation result. A diagnosis can only exist on the incorrect branch.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
  Correct,
  Incorrect { diagnosis: Diagnosis },
}

/// Answer and verdict are stored together, so one is never present without the other.
#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
  pub answer: String,
  pub outcome: Outcome,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
  pub current_standard_id: String,
  pub mode: Mode,
  pub current_question: Option<Question>,
  pub submission: Option<Submission>,
  /// Diagnosis that triggered the last gap-fix; scaffolds questions while remediating.
  pub remediation_context: Option<Diagnosis>,
}

impl SessionState {
  pub fn new(default_standard: &str) -> Self {
    Self {
      current_standard_id: default_standard.to_string(),
      mode: Mode::Assessment,
      current_question: None,
      submission: None,
      remediation_context: None,
    }
  }

  pub fn phase(&self) -> Phase {
    match (&self.current_question, &self.submission) {
      (None, _) => Phase::AwaitingQuestion,
      (Some(_), None) => Phase::AwaitingAnswer,
      (Some(_), Some(Submission { outcome: Outcome::Correct, .. })) => Phase::AnsweredCorrect,
      (Some(_), Some(Submission { outcome: Outcome::Incorrect { .. }, .. })) => Phase::AnsweredIncorrect,
    }
  }

  pub fn submitted_answer(&self) -> Option<&str> {
    self.submission.as_ref().map(|s| s.answer.as_str())
  }

  pub fn is_correct(&self) -> Option<bool> {
    self.submission.as_ref().map(|s| matches!(s.outcome, Outcome::Correct))
  }

  pub fn last_diagnosis(&self) -> Option<&Diagnosis> {
    match &self.submission {
      Some(Submission { outcome: Outcome::Incorrect { diagnosis }, .. }) => Some(diagnosis),
      _ => None,
    }
  }

  /// Scaffolding hint for question generation; only while remediating.
  pub fn error_context(&self) -> Option<&ErrorContext> {
    match self.mode {
      Mode::Remediation => self.remediation_context.as_ref(),
      Mode::Assessment => None,
    }
  }

  pub fn expect_phase(&self, wanted: Phase, action: &'static str) -> Result<(), Rejection> {
    let phase = self.phase();
    if phase == wanted {
      Ok(())
    } else {
      Err(Rejection::WrongPhase { action, phase: phase.as_str() })
    }
  }

  fn clear_question(&mut self) {
    self.current_question = None;
    self.submission = None;
  }
}

/// Read-only inputs every transition may consult.
#[derive(Clone, Copy)]
pub struct Rules<'a> {
  pub graph: &'a Curriculum,
  pub policy: RoutingPolicy,
  pub default_standard: &'a str,
}

/// Where fix-gap would send the student right now, if anywhere.
/// A routed id missing from the graph counts as no route.
pub fn gap_target<'a>(state: &SessionState, rules: &Rules<'a>) -> Option<&'a StandardNode> {
  let diagnosis = state.last_diagnosis()?;
  let current = rules.graph.lookup(&state.current_standard_id)?;
  let target = route(current, diagnosis.error_category, rules.policy)?;
  rules.graph.lookup(target)
}

#[derive(Clone, Debug)]
pub enum Event {
  QuestionGenerated(Question),
  /// `diagnosis` is consulted only when the answer turns out incorrect.
  AnswerEvaluated { answer: String, diagnosis: Option<Diagnosis> },
  Advance,
  Retry,
  FixGap,
  Navigate(String),
  Reset,
}

impl Event {
  pub fn action(&self) -> &'static str {
    match self {
      Event::QuestionGenerated(_) => "load a question",
      Event::AnswerEvaluated { .. } => "submit an answer",
      Event::Advance => "advance",
      Event::Retry => "retry",
      Event::FixGap => "fix the gap",
      Event::Navigate(_) => "navigate",
      Event::Reset => "reset",
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
  /// The session sits in AwaitingQuestion; the shell may generate one.
  QuestionNeeded,
  Hint(String),
  Rejected(Rejection),
}

/// Apply one event. A rejected event leaves the state untouched and reports why.
pub fn apply(state: &SessionState, event: Event, rules: &Rules) -> (SessionState, Vec<Effect>) {
  let action = event.action();
  match transition(state, event, rules) {
    Ok(next) => {
      let phase = next.phase();
      debug!(target: "session", action, from = state.phase().as_str(), to = phase.as_str(), standard = %next.current_standard_id, "Transition applied");
      let effects = if phase == Phase::AwaitingQuestion { vec![Effect::QuestionNeeded] } else { Vec::new() };
      (next, effects)
    }
    Err(rejection) => {
      info!(target: "session", action, phase = state.phase().as_str(), reason = %rejection, "Transition rejected");
      (state.clone(), vec![Effect::Rejected(rejection)])
    }
  }
}

fn transition(state: &SessionState, event: Event, rules: &Rules) -> Result<SessionState, Rejection> {
  let action = event.action();
  let mut next = state.clone();
  match event {
    Event::QuestionGenerated(question) => {
      state.expect_phase(Phase::AwaitingQuestion, action)?;
      next.current_question = Some(question);
      next.submission = None;
    }

    Event::AnswerEvaluated { answer, diagnosis } => {
      state.expect_phase(Phase::AwaitingAnswer, action)?;
      let correct = state.current_question.as_ref().is_some_and(|q| q.is_correct(&answer));
      let outcome = if correct {
        Outcome::Correct
      } else {
        Outcome::Incorrect { diagnosis: diagnosis.unwrap_or_else(crate::seeds::fallback_diagnosis) }
      };
      next.submission = Some(Submission { answer, outcome });
    }

    Event::Advance => {
      state.expect_phase(Phase::AnsweredCorrect, action)?;
      next.clear_question();
    }

    Event::Retry => {
      state.expect_phase(Phase::AnsweredIncorrect, action)?;
      next.clear_question();
    }

    Event::FixGap => {
      state.expect_phase(Phase::AnsweredIncorrect, action)?;
      let target = gap_target(state, rules).ok_or_else(|| Rejection::NoGapRoute(state.current_standard_id.clone()))?;
      info!(target: "session", from = %state.current_standard_id, to = %target.id, "Routing to prerequisite");
      next.remediation_context = state.last_diagnosis().cloned();
      next.current_standard_id = target.id.clone();
      // Also for foundation targets: only reset leaves REMEDIATION.
      next.mode = Mode::Remediation;
      next.clear_question();
    }

    Event::Navigate(target) => {
      if !rules.graph.contains(&target) {
        return Err(Rejection::UnknownStandard(target));
      }
      next.current_standard_id = target;
      next.clear_question();
    }

    Event::Reset => {
      next = SessionState::new(rules.default_standard);
    }
  }
  Ok(next)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ErrorCategory;
  use indexmap::IndexMap;
  use uuid::Uuid;

  const DOC: &str = r#"{
    "nodes": {
      "7.EE.B.4a": {"grade": 7, "description": "Two-step equations", "prerequisites": {"ARITHMETIC": "6.NS.B.3"}},
      "6.NS.B.3": {"grade": 6, "description": "Decimal operations", "prerequisites": {}},
      "7.G.B.4": {"grade": 7, "description": "Circles", "prerequisites": {"GEOMETRIC": "6.G.DANGLING"}}
    },
    "strands": {}
  }"#;

  fn graph() -> Curriculum {
    Curriculum::from_json_str(DOC, "test").unwrap()
  }

  fn rules(graph: &Curriculum) -> Rules<'_> {
    Rules { graph, policy: RoutingPolicy::Fallback, default_standard: "7.EE.B.4a" }
  }

  fn question() -> Question {
    Question {
      id: Uuid::new_v4(),
      question_text: "Pick B".into(),
      options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
      correct_answer: "B".into(),
      analysis: IndexMap::new(),
    }
  }

  fn diag(cat: ErrorCategory) -> Diagnosis {
    Diagnosis { error_category: cat, explanation: "because".into() }
  }

  fn step(state: &SessionState, event: Event, r: &Rules) -> SessionState {
    let (next, effects) = apply(state, event, r);
    assert!(!effects.iter().any(|e| matches!(e, Effect::Rejected(_))), "unexpected rejection: {effects:?}");
    assert_invariants(&next);
    next
  }

  fn assert_invariants(s: &SessionState) {
    assert_eq!(s.submitted_answer().is_some(), s.is_correct().is_some());
    if s.last_diagnosis().is_some() {
      assert_eq!(s.is_correct(), Some(false));
    }
  }

  fn answered_wrong(cat: ErrorCategory, standard: &str, r: &Rules) -> SessionState {
    let s = step(&SessionState::new(standard), Event::QuestionGenerated(question()), r);
    step(&s, Event::AnswerEvaluated { answer: "A".into(), diagnosis: Some(diag(cat)) }, r)
  }

  #[test]
  fn initial_state_awaits_question() {
    let s = SessionState::new("7.EE.B.4a");
    assert_eq!(s.phase(), Phase::AwaitingQuestion);
    assert_eq!(s.mode, Mode::Assessment);
    assert!(s.is_correct().is_none());
  }

  #[test]
  fn correct_answer_path() {
    let g = graph();
    let r = rules(&g);
    let s = step(&SessionState::new("7.EE.B.4a"), Event::QuestionGenerated(question()), &r);
    assert_eq!(s.phase(), Phase::AwaitingAnswer);
    let s = step(&s, Event::AnswerEvaluated { answer: "B".into(), diagnosis: Some(diag(ErrorCategory::Skill)) }, &r);
    assert_eq!(s.phase(), Phase::AnsweredCorrect);
    assert_eq!(s.is_correct(), Some(true));
    assert!(s.last_diagnosis().is_none());

    let (s, effects) = apply(&s, Event::Advance, &r);
    assert_eq!(effects, vec![Effect::QuestionNeeded]);
    assert!(s.current_question.is_none());
    assert_eq!(s.current_standard_id, "7.EE.B.4a");
  }

  #[test]
  fn scenario_a_exact_route() {
    let g = graph();
    let r = rules(&g);
    let s = answered_wrong(ErrorCategory::Arithmetic, "7.EE.B.4a", &r);
    assert_eq!(gap_target(&s, &r).map(|n| n.id.as_str()), Some("6.NS.B.3"));
    let s = step(&s, Event::FixGap, &r);
    assert_eq!(s.current_standard_id, "6.NS.B.3");
    assert_eq!(s.mode, Mode::Remediation);
    assert_eq!(s.phase(), Phase::AwaitingQuestion);
    assert_eq!(s.error_context().map(|c| c.error_category), Some(ErrorCategory::Arithmetic));
  }

  #[test]
  fn scenario_b_fallback_route() {
    let g = graph();
    let r = rules(&g);
    let s = answered_wrong(ErrorCategory::Geometric, "7.EE.B.4a", &r);
    let s = step(&s, Event::FixGap, &r);
    assert_eq!(s.current_standard_id, "6.NS.B.3");
    assert_eq!(s.mode, Mode::Remediation);
  }

  #[test]
  fn scenario_c_foundation_cannot_route() {
    let g = graph();
    let r = rules(&g);
    for cat in ErrorCategory::ALL {
      let s = answered_wrong(cat, "6.NS.B.3", &r);
      assert!(gap_target(&s, &r).is_none());
      let (after, effects) = apply(&s, Event::FixGap, &r);
      assert_eq!(after, s);
      assert_eq!(effects, vec![Effect::Rejected(Rejection::NoGapRoute("6.NS.B.3".into()))]);
    }
  }

  #[test]
  fn fix_gap_to_foundation_keeps_remediation() {
    let g = graph();
    let r = rules(&g);
    let s = step(&answered_wrong(ErrorCategory::Arithmetic, "7.EE.B.4a", &r), Event::FixGap, &r);
    assert!(g.lookup("6.NS.B.3").unwrap().prerequisites.is_empty());
    assert_eq!(s.mode, Mode::Remediation);

    // Mastering the foundation node and advancing stays in REMEDIATION.
    let s = step(&s, Event::QuestionGenerated(question()), &r);
    let s = step(&s, Event::AnswerEvaluated { answer: "B".into(), diagnosis: None }, &r);
    let s = step(&s, Event::Advance, &r);
    assert_eq!(s.current_standard_id, "6.NS.B.3");
    assert_eq!(s.mode, Mode::Remediation);

    let s = step(&s, Event::Reset, &r);
    assert_eq!(s.mode, Mode::Assessment);
  }

  #[test]
  fn dangling_route_is_no_route() {
    let g = graph();
    let r = rules(&g);
    let s = answered_wrong(ErrorCategory::Geometric, "7.G.B.4", &r);
    assert!(gap_target(&s, &r).is_none());
  }

  #[test]
  fn exact_only_policy_blocks_mismatch() {
    let g = graph();
    let r = Rules { policy: RoutingPolicy::ExactOnly, ..rules(&g) };
    let s = answered_wrong(ErrorCategory::Geometric, "7.EE.B.4a", &r);
    assert!(gap_target(&s, &r).is_none());
  }

  #[test]
  fn retry_keeps_standard_and_drops_diagnosis() {
    let g = graph();
    let r = rules(&g);
    let s = answered_wrong(ErrorCategory::Arithmetic, "7.EE.B.4a", &r);
    let s = step(&s, Event::Retry, &r);
    assert_eq!(s.current_standard_id, "7.EE.B.4a");
    assert!(s.current_question.is_none());
    assert!(s.last_diagnosis().is_none());
    assert!(s.submitted_answer().is_none());
  }

  #[test]
  fn wrong_phase_events_are_no_ops() {
    let g = graph();
    let r = rules(&g);
    let fresh = SessionState::new("7.EE.B.4a");
    for ev in [Event::Advance, Event::Retry, Event::FixGap, Event::AnswerEvaluated { answer: "B".into(), diagnosis: None }] {
      let (after, effects) = apply(&fresh, ev, &r);
      assert_eq!(after, fresh);
      assert!(matches!(effects.as_slice(), [Effect::Rejected(Rejection::WrongPhase { .. })]));
    }

    let awaiting = step(&fresh, Event::QuestionGenerated(question()), &r);
    let (after, effects) = apply(&awaiting, Event::QuestionGenerated(question()), &r);
    assert_eq!(after, awaiting);
    assert_eq!(effects.len(), 1);

    let correct = step(&awaiting, Event::AnswerEvaluated { answer: "B".into(), diagnosis: None }, &r);
    let (after, _) = apply(&correct, Event::Retry, &r);
    assert_eq!(after, correct);
  }

  #[test]
  fn navigation_round_trip_clears_questions() {
    let g = graph();
    let r = rules(&g);
    let s = step(&SessionState::new("7.EE.B.4a"), Event::QuestionGenerated(question()), &r);
    let s = step(&s, Event::Navigate("6.NS.B.3".into()), &r);
    assert!(s.current_question.is_none());
    let s = step(&s, Event::Navigate("7.G.B.4".into()), &r);
    let s = step(&s, Event::Navigate("6.NS.B.3".into()), &r);
    assert_eq!(s.current_standard_id, "6.NS.B.3");
    assert!(s.current_question.is_none());
  }

  #[test]
  fn navigate_to_unknown_standard_is_rejected() {
    let g = graph();
    let r = rules(&g);
    let s = step(&SessionState::new("7.EE.B.4a"), Event::QuestionGenerated(question()), &r);
    let (after, effects) = apply(&s, Event::Navigate("9.Z.Z.9".into()), &r);
    assert_eq!(after, s);
    assert_eq!(effects, vec![Effect::Rejected(Rejection::UnknownStandard("9.Z.Z.9".into()))]);
  }

  #[test]
  fn navigation_and_advance_keep_remediation_mode() {
    let g = graph();
    let r = rules(&g);
    let s = answered_wrong(ErrorCategory::Arithmetic, "7.EE.B.4a", &r);
    let s = step(&s, Event::FixGap, &r);
    let s = step(&s, Event::QuestionGenerated(question()), &r);
    let s = step(&s, Event::AnswerEvaluated { answer: "B".into(), diagnosis: None }, &r);
    let s = step(&s, Event::Advance, &r);
    assert_eq!(s.mode, Mode::Remediation);
    let s = step(&s, Event::Navigate("7.G.B.4".into()), &r);
    assert_eq!(s.mode, Mode::Remediation);
    assert!(s.error_context().is_some());
  }

  #[test]
  fn reset_returns_to_default_assessment() {
    let g = graph();
    let r = rules(&g);
    let s = answered_wrong(ErrorCategory::Arithmetic, "7.EE.B.4a", &r);
    let s = step(&s, Event::FixGap, &r);
    let s = step(&s, Event::Reset, &r);
    assert_eq!(s, SessionState::new("7.EE.B.4a"));
    assert!(s.error_context().is_none());
  }

  #[test]
  fn incorrect_without_diagnosis_gets_fallback() {
    let g = graph();
    let r = rules(&g);
    let s = step(&SessionState::new("7.EE.B.4a"), Event::QuestionGenerated(question()), &r);
    let s = step(&s, Event::AnswerEvaluated { answer: "Z".into(), diagnosis: None }, &r);
    assert_eq!(s.last_diagnosis().map(|d| d.error_category), Some(ErrorCategory::Conceptual));
  }

  #[test]
  fn answer_outside_options_is_incorrect() {
    let g = graph();
    let r = rules(&g);
    let mut q = question();
    q.correct_answer = "E".into();
    let s = step(&SessionState::new("7.EE.B.4a"), Event::QuestionGenerated(q), &r);
    for opt in ["A", "B", "C", "D"] {
      let (after, _) = apply(&s, Event::AnswerEvaluated { answer: opt.into(), diagnosis: None }, &r);
      assert_eq!(after.is_correct(), Some(false));
    }
  }
}
