//! Minimal OpenAI client and the content provider built on it.
//!
//! We only call chat.completions and request either plain text or a JSON object.
//! Calls are instrumented and log model names, latencies and response sizes, with
//! short previews of contents.
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{Diagnosis, ErrorContext, Question};
use crate::error::StartupError;
use crate::provider::{coerce_diagnosis, coerce_hint, coerce_question, ContentProvider};
use crate::seeds::{fallback_diagnosis, sentinel_question, FALLBACK_HINT};
use crate::util::{fill_template, trunc_for_log};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
}

impl OpenAI {
  /// Construct the client from environment variables read through `env`.
  /// A missing or blank OPENAI_API_KEY is fatal: the tutor cannot serve a single
  /// question without a provider.
  pub fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Result<Self, StartupError> {
    let api_key = env("OPENAI_API_KEY")
      .filter(|k| !k.trim().is_empty())
      .ok_or(StartupError::MissingApiKey)?;
    let base_url = env("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".into());
    let fast_model = env("OPENAI_FAST_MODEL").unwrap_or_else(|| "gpt-4o-mini".into());
    let strong_model = env("OPENAI_STRONG_MODEL").unwrap_or_else(|| "gpt-4o".into());
    let timeout = env("OPENAI_TIMEOUT_SECS")
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(20);

    Self::new(api_key, base_url, fast_model, strong_model, Duration::from_secs(timeout))
  }

  pub fn new(
    api_key: String,
    base_url: String,
    fast_model: String,
    strong_model: String,
    timeout: Duration,
  ) -> Result<Self, StartupError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| StartupError::HttpClient(e.to_string()))?;
    Ok(Self { client, api_key, base_url, fast_model, strong_model })
  }

  async fn chat(&self, req: &ChatCompletionRequest) -> Result<String, String> {
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let res = self.client.post(&url)
      .header(USER_AGENT, "mathnav-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      return Err(format!("OpenAI HTTP {}: {}", status, trunc_for_log(&msg, 200)));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(target: "provider", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    Ok(body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default())
  }

  /// Plain-text chat completion. Used for hints.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_plain(&self, model: &str, system: &str, user: &str, temperature: f32) -> Result<String, String> {
    let req = ChatCompletionRequest::new(model, system, user, temperature, None);
    Ok(self.chat(&req).await?.trim().to_string())
  }

  /// JSON-object chat completion, returned untyped so the provider boundary can coerce it.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json(&self, model: &str, system: &str, user: &str, temperature: f32) -> Result<Value, String> {
    let req = ChatCompletionRequest::new(
      model,
      system,
      user,
      temperature,
      Some(ResponseFormat { r#type: "json_object".into() }),
    );
    let text = self.chat(&req).await?;
    serde_json::from_str::<Value>(&text)
      .map_err(|e| format!("JSON parse error: {} (body: {})", e, trunc_for_log(&text, 120)))
  }
}

/// `ContentProvider` backed by an OpenAI-compatible chat endpoint.
#[derive(Clone)]
pub struct OpenAiProvider {
  pub openai: OpenAI,
  pub prompts: Prompts,
}

impl OpenAiProvider {
  pub fn new(openai: OpenAI, prompts: Prompts) -> Self {
    Self { openai, prompts }
  }

  fn context_line(&self, context: Option<&ErrorContext>) -> String {
    match context {
      Some(ctx) => fill_template(
        &self.prompts.scaffold_context_template,
        &[("category", ctx.error_category.as_str()), ("explanation", &ctx.explanation)],
      ),
      None => self.prompts.standard_context.clone(),
    }
  }
}

#[async_trait]
impl ContentProvider for OpenAiProvider {
  #[instrument(level = "info", skip(self, description, context), fields(%standard_id, scaffolded = context.is_some(), model = %self.openai.strong_model))]
  async fn generate_question(&self, standard_id: &str, description: &str, context: Option<&ErrorContext>) -> Question {
    let ctx_line = self.context_line(context);
    let user = fill_template(
      &self.prompts.question_user_template,
      &[("standard_id", standard_id), ("description", description), ("context", &ctx_line)],
    );
    let start = Instant::now();
    let result = self.openai.chat_json(&self.openai.strong_model, &self.prompts.question_system, &user, 0.9).await;
    let elapsed = start.elapsed();

    match result {
      Ok(raw) => {
        let q = coerce_question(raw);
        info!(
          target: "provider",
          ?elapsed,
          question_id = %q.id,
          options = q.options.len(),
          preview = %trunc_for_log(&q.question_text, 40),
          "Question generated"
        );
        q
      }
      Err(e) => {
        error!(target: "provider", ?elapsed, error = %e, "Question generation failed; using sentinel");
        sentinel_question(e)
      }
    }
  }

  #[instrument(level = "info", skip(self, question_text, wrong_answer), fields(%standard_id, answer_len = wrong_answer.len()))]
  async fn diagnose_gap(&self, question_text: &str, wrong_answer: &str, standard_id: &str) -> Diagnosis {
    let user = fill_template(
      &self.prompts.diagnosis_user_template,
      &[("standard_id", standard_id), ("question_text", question_text), ("wrong_answer", wrong_answer)],
    );
    match self.openai.chat_json(&self.openai.strong_model, &self.prompts.diagnosis_system, &user, 0.2).await {
      Ok(raw) => {
        let d = coerce_diagnosis(raw);
        info!(target: "provider", category = %d.error_category, "Gap diagnosed");
        d
      }
      Err(e) => {
        error!(target: "provider", error = %e, "Diagnosis failed; defaulting to CONCEPTUAL");
        fallback_diagnosis()
      }
    }
  }

  #[instrument(level = "info", skip(self, question_text), fields(question_len = question_text.len()))]
  async fn generate_hint(&self, question_text: &str) -> String {
    let user = fill_template(&self.prompts.hint_user_template, &[("question_text", question_text)]);
    match self.openai.chat_plain(&self.openai.fast_model, &self.prompts.hint_system, &user, 0.3).await {
      Ok(text) => coerce_hint(&text),
      Err(e) => {
        error!(target: "provider", error = %e, "Hint generation failed; using study tip");
        FALLBACK_HINT.to_string()
      }
    }
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}

impl ChatCompletionRequest {
  fn new(model: &str, system: &str, user: &str, temperature: f32, response_format: Option<ResponseFormat>) -> Self {
    Self {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format,
    }
  }
}

#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
