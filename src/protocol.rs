//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::curriculum::{Curriculum, StandardNode, Strand};
use crate::domain::{Diagnosis, ErrorCategory, Mode};
use crate::logic::{Command, Tutor};
use crate::session::{gap_target, Effect, Phase, SessionState};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  GetState,
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

impl ClientWsMessage {
  /// Session commands; `None` for transport-only messages.
  pub fn into_command(self) -> Option<Command> {
    match self {
      ClientWsMessage::Ping | ClientWsMessage::GetState => None,
      ClientWsMessage::SelectStandard { standard_id } => Some(Command::SelectStandard { standard_id }),
      ClientWsMessage::RequestQuestion => Some(Command::RequestQuestion),
      ClientWsMessage::SubmitAnswer { answer } => Some(Command::SubmitAnswer { answer }),
      ClientWsMessage::RequestHint => Some(Command::RequestHint),
      ClientWsMessage::Advance => Some(Command::Advance),
      ClientWsMessage::Retry => Some(Command::Retry),
      ClientWsMessage::FixGap => Some(Command::FixGap),
      ClientWsMessage::Reset => Some(Command::Reset),
    }
  }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  State { view: SessionView },
  Hint { text: String },
  Rejected { message: String, view: SessionView },
  Error { message: String },
}

//
// Read-only projection of a session
//

#[derive(Debug, Clone, Serialize)]
pub struct StandardOut {
  pub id: String,
  pub grade: i32,
  pub description: String,
}

impl From<&StandardNode> for StandardOut {
  fn from(n: &StandardNode) -> Self {
    Self { id: n.id.clone(), grade: n.grade, description: n.description.clone() }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionOut {
  pub id: Uuid,
  pub question_text: String,
  pub options: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub analysis: Option<IndexMap<String, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOut {
  pub answer: String,
  pub is_correct: bool,
  pub correct_answer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
  pub standard: StandardOut,
  pub mode: Mode,
  pub phase: Phase,
  pub question: Option<QuestionOut>,
  pub submission: Option<SubmissionOut>,
  pub diagnosis: Option<Diagnosis>,
  /// Where fix-gap would go; null when it is not offerable.
  pub gap_target: Option<StandardOut>,
}

pub fn to_view(tutor: &Tutor, state: &SessionState) -> SessionView {
  let rules = tutor.rules();
  let standard = tutor
    .graph
    .lookup(&state.current_standard_id)
    .map(StandardOut::from)
    .unwrap_or_else(|| StandardOut { id: state.current_standard_id.clone(), grade: 0, description: String::new() });

  let question = state.current_question.as_ref().map(|q| QuestionOut {
    id: q.id,
    question_text: q.question_text.clone(),
    options: q.options.clone(),
    analysis: tutor.settings.show_analysis.then(|| q.analysis.clone()),
  });

  let submission = match (&state.current_question, state.submitted_answer(), state.is_correct()) {
    (Some(q), Some(answer), Some(is_correct)) => Some(SubmissionOut {
      answer: answer.to_string(),
      is_correct,
      correct_answer: q.correct_answer.clone(),
    }),
    _ => None,
  };

  SessionView {
    standard,
    mode: state.mode,
    phase: state.phase(),
    question,
    submission,
    diagnosis: state.last_diagnosis().cloned(),
    gap_target: gap_target(state, &rules).map(StandardOut::from),
  }
}

/// Fold handler effects into one reply. Hint and rejection win over a plain state push.
pub fn reply_for(tutor: &Tutor, state: &SessionState, effects: &[Effect]) -> ServerWsMessage {
  for e in effects {
    match e {
      Effect::Hint(text) => return ServerWsMessage::Hint { text: text.clone() },
      Effect::Rejected(r) => return ServerWsMessage::Rejected { message: r.to_string(), view: to_view(tutor, state) },
      Effect::QuestionNeeded => {}
    }
  }
  ServerWsMessage::State { view: to_view(tutor, state) }
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub standards: usize,
}

#[derive(Serialize)]
pub struct StrandOut {
  pub id: String,
  pub name: String,
  pub description: String,
  pub standards: Vec<String>,
}

impl From<&Strand> for StrandOut {
  fn from(s: &Strand) -> Self {
    Self { id: s.id.clone(), name: s.name.clone(), description: s.description.clone(), standards: s.standards.clone() }
  }
}

/// Progression ladder of one strand.
#[derive(Serialize)]
pub struct StrandDetailOut {
  pub strand: StrandOut,
  pub members: Vec<StandardOut>,
}

#[derive(Serialize)]
pub struct PrerequisiteOut {
  pub category: ErrorCategory,
  pub standard: StandardOut,
}

/// Vertical alignment map around one standard.
#[derive(Serialize)]
pub struct StandardMapOut {
  pub standard: StandardOut,
  pub prerequisites: Vec<PrerequisiteOut>,
  pub unlocks: Vec<StandardOut>,
}

pub fn standard_map(graph: &Curriculum, id: &str) -> Option<StandardMapOut> {
  let node = graph.lookup(id)?;
  Some(StandardMapOut {
    standard: node.into(),
    prerequisites: graph
      .prerequisites_of(id)
      .into_iter()
      .map(|(category, n)| PrerequisiteOut { category, standard: n.into() })
      .collect(),
    unlocks: graph.descendants_of(id).into_iter().map(StandardOut::from).collect(),
  })
}

#[derive(Serialize)]
pub struct SessionOut {
  pub id: Uuid,
  pub view: SessionView,
}

#[derive(Serialize)]
pub struct EventOut {
  pub view: SessionView,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub hint: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rejected: Option<String>,
}

impl EventOut {
  pub fn new(tutor: &Tutor, state: &SessionState, effects: &[Effect]) -> Self {
    let mut out = Self { view: to_view(tutor, state), hint: None, rejected: None };
    for e in effects {
      match e {
        Effect::Hint(text) => out.hint = Some(text.clone()),
        Effect::Rejected(r) => out.rejected = Some(r.to_string()),
        Effect::QuestionNeeded => {}
      }
    }
    out
  }
}
