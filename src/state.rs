//! Application state: curriculum graph, tutor (provider + settings) and HTTP sessions.
//!
//! WebSocket connections own their session locally; HTTP clients get a session id
//! and their state lives here, each behind its own mutex so one transition (provider
//! call included) completes before the next one on the same session starts.
//!
//! The store is bounded: idle sessions are swept after `idle_ttl_secs`, and at
//! `max_sessions` the least recently touched session is evicted on create.

use std::{
  collections::HashMap,
  path::PathBuf,
  sync::Arc,
  time::{Duration, Instant},
};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::{load_agent_config, SessionLimits};
use crate::curriculum::Curriculum;
use crate::error::StartupError;
use crate::logic::Tutor;
use crate::openai::{OpenAI, OpenAiProvider};
use crate::provider::ContentProvider;
use crate::seeds::BUILTIN_CURRICULUM;
use crate::session::SessionState;

pub type SharedSession = Arc<Mutex<SessionState>>;

struct SessionEntry {
  session: SharedSession,
  last_touched: Instant,
}

#[derive(Clone)]
pub struct AppState {
  pub tutor: Tutor,
  pub limits: SessionLimits,
  sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl AppState {
  /// Build state from the process environment.
  pub fn from_env() -> Result<Self, StartupError> {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  /// Load config and curriculum, init the OpenAI provider, reading variables through `env`.
  /// Fails fast on anything that would make every session unusable.
  #[instrument(level = "info", skip_all)]
  pub fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Result<Self, StartupError> {
    let openai = OpenAI::from_lookup(&env)?;
    info!(target: "mathnav_backend", base_url = %openai.base_url, fast_model = %openai.fast_model, strong_model = %openai.strong_model, "OpenAI content provider enabled.");

    let cfg = env("AGENT_CONFIG_PATH")
      .and_then(|path| load_agent_config(&path))
      .unwrap_or_default();
    let mut settings = cfg.tutor;
    if let Some(id) = env("DEFAULT_STANDARD") {
      settings.default_standard = id;
    }

    let graph = match env("CURRICULUM_PATH") {
      Some(path) => Curriculum::load(&PathBuf::from(path))?,
      None => Curriculum::from_json_str(BUILTIN_CURRICULUM, "builtin")?,
    };

    let provider: Arc<dyn ContentProvider> = Arc::new(OpenAiProvider::new(openai, cfg.prompts));

    Ok(Self::new(Tutor::new(Arc::new(graph), provider, settings))?.with_limits(cfg.sessions))
  }

  pub fn new(tutor: Tutor) -> Result<Self, StartupError> {
    if !tutor.graph.contains(&tutor.settings.default_standard) {
      return Err(StartupError::UnknownDefaultStandard { id: tutor.settings.default_standard.clone() });
    }
    info!(
      target: "mathnav_backend",
      default_standard = %tutor.settings.default_standard,
      routing = ?tutor.settings.routing,
      auto_generate = tutor.settings.auto_generate,
      "Tutor ready"
    );
    Ok(Self {
      tutor,
      limits: SessionLimits::default(),
      sessions: Arc::new(RwLock::new(HashMap::new())),
    })
  }

  pub fn with_limits(mut self, limits: SessionLimits) -> Self {
    self.limits = limits;
    self
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn create_session(&self) -> (Uuid, SharedSession) {
    let id = Uuid::new_v4();
    let session = Arc::new(Mutex::new(self.tutor.new_session()));
    let now = Instant::now();
    let mut sessions = self.sessions.write().await;
    if sessions.len() >= self.limits.max_sessions.max(1) {
      let oldest = sessions.iter().min_by_key(|(_, e)| e.last_touched).map(|(k, _)| *k);
      if let Some(evicted) = oldest {
        sessions.remove(&evicted);
        info!(target: "session", %evicted, max = self.limits.max_sessions, "Session store full; evicted least recently used");
      }
    }
    sessions.insert(id, SessionEntry { session: session.clone(), last_touched: now });
    info!(target: "session", %id, live = sessions.len(), "Session created");
    (id, session)
  }

  /// Fetch a session and mark it as used.
  #[instrument(level = "debug", skip(self), fields(%id))]
  pub async fn get_session(&self, id: Uuid) -> Option<SharedSession> {
    let mut sessions = self.sessions.write().await;
    let entry = sessions.get_mut(&id)?;
    entry.last_touched = Instant::now();
    Some(entry.session.clone())
  }

  #[instrument(level = "debug", skip(self), fields(%id))]
  pub async fn remove_session(&self, id: Uuid) -> bool {
    let removed = self.sessions.write().await.remove(&id).is_some();
    if removed {
      info!(target: "session", %id, "Session deleted");
    }
    removed
  }

  pub async fn session_count(&self) -> usize {
    self.sessions.read().await.len()
  }

  /// Drop sessions idle longer than the TTL as of `now`. Returns how many were dropped.
  pub async fn sweep_idle(&self, now: Instant) -> usize {
    let ttl = Duration::from_secs(self.limits.idle_ttl_secs);
    let mut sessions = self.sessions.write().await;
    let before = sessions.len();
    sessions.retain(|_, e| now.saturating_duration_since(e.last_touched) < ttl);
    let dropped = before - sessions.len();
    if dropped > 0 {
      info!(target: "session", dropped, live = sessions.len(), "Idle sessions swept");
    }
    dropped
  }

  /// Background task running `sweep_idle` every `sweep_interval_secs`.
  pub fn spawn_session_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
    let state = Arc::clone(self);
    let period = Duration::from_secs(state.limits.sweep_interval_secs.max(1));
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(period);
      loop {
        ticker.tick().await;
        let dropped = state.sweep_idle(Instant::now()).await;
        debug!(target: "session", dropped, "Sweep tick");
      }
    })
  }
}
