//! Commentary generation via DashScope's OpenAI-compatible chat endpoint.
//!
//! Pipeline:
//! 1. Events → fragments (events::event_to_text, empty fragments skipped)
//! 2. Game state → battle line + critical advisory + hand lines
//! 3. System + user messages → one synchronous chat-completion call
//! 4. First choice content, trimmed → commentary text

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::events::{event_to_text, summarize_game_state, ActorSummary, Card, GameEvent};

pub const DEFAULT_MODEL: &str = "qwen-plus";
pub const DEFAULT_MAX_TOKENS: u32 = 50;
pub const DEFAULT_TEMPERATURE: f32 = 0.9;

/// Health at or below this is worth calling out.
const CRITICAL_HEALTH: i64 = 30;

const SYSTEM_PROMPT: &str = r#"You are an esports commentator narrating a Git card battle.

[rules] Health 100, mana +1 per turn (max 10), hand limit 7 cards. Cards: attack (Add/Commit/Push/Merge/Clone), healing (Pull/Revert), special (Rebase/Reset/Branch/Stash/Cherry Pick).

[output]
- One short sentence of 15-30 characters
- Conversational and emotional

You may pick any topic or angle you like."#;

/// Body of POST /api/commentary. Tuning fields are optional; `None` (or
/// JSON null) falls back to the documented defaults at call time.
#[derive(Debug, Deserialize)]
pub struct CommentaryRequest {
    pub events: Vec<GameEvent>,
    #[serde(default)]
    pub game_state: Option<Value>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Error)]
pub enum CommentaryError {
    #[error("request to DashScope failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("DashScope returned status {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected completion shape: {0}")]
    MalformedResponse(String),
    #[error("generated commentary was empty")]
    EmptyCompletion,
}

/// Assemble the user message: event fragments, then (when state is given)
/// a battle line, a critical-condition advisory, per-side hand lines, and
/// the closing length instruction.
pub fn build_user_prompt(events: &[GameEvent], game_state: Option<&Value>) -> String {
    let mut prompt = String::from("[events]");
    for event in events {
        let fragment = event_to_text(event);
        if !fragment.is_empty() {
            prompt.push_str(&format!(" {fragment};"));
        }
    }

    if let Some(state) = game_state {
        let summary = summarize_game_state(state);
        prompt.push_str(&format!(
            "\n[battle] player {}HP opponent {}HP turn {}",
            summary.player.health, summary.opponent.health, summary.turn_number
        ));

        let mut critical = Vec::new();
        if summary.player.health <= CRITICAL_HEALTH {
            critical.push("player health critical".to_string());
        }
        if summary.opponent.health <= CRITICAL_HEALTH {
            critical.push("opponent health critical".to_string());
        }
        if let Some(line) = buff_line("player", &summary.player) {
            critical.push(line);
        }
        if let Some(line) = buff_line("opponent", &summary.opponent) {
            critical.push(line);
        }
        if !critical.is_empty() {
            prompt.push_str(&format!(" {}", critical.join(" ")));
        }

        if let Some(hand) = summary.player.hand.as_deref().filter(|h| !h.is_empty()) {
            prompt.push_str(&format!("\n[player hand] {}", format_hand(hand)));
        }
        if let Some(hand) = summary.opponent.hand.as_deref().filter(|h| !h.is_empty()) {
            prompt.push_str(&format!("\n[opponent hand] {}", format_hand(hand)));
        }
    }

    prompt.push_str("\n[output] One short sentence of 15-30 characters.");
    prompt
}

fn buff_line(side: &str, actor: &ActorSummary) -> Option<String> {
    let names: Vec<&str> = actor
        .buffs
        .as_deref()?
        .iter()
        .map(|b| b.name.as_str())
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(format!("{side} buffs: {}", names.join(",")))
    }
}

fn format_hand(hand: &[Card]) -> String {
    hand.iter().map(format_card).collect::<Vec<_>>().join(",")
}

/// `{icon}{name}(attr:value,...)` with only non-zero/non-empty attributes.
fn format_card(card: &Card) -> String {
    let mut info = format!("{}{}", card.icon, card.name);
    let mut attrs = Vec::new();
    if !card.card_type.is_empty() {
        attrs.push(format!("type:{}", card.card_type));
    }
    if card.cost > 0 {
        attrs.push(format!("cost:{}", card.cost));
    }
    if card.power > 0 {
        attrs.push(format!("power:{}", card.power));
    }
    if card.heal > 0 {
        attrs.push(format!("heal:{}", card.heal));
    }
    if card.draw > 0 {
        attrs.push(format!("draw:{}", card.draw));
    }
    if !attrs.is_empty() {
        info.push_str(&format!("({})", attrs.join(",")));
    }
    info
}

/// Client for the chat-completion endpoint. Stateless between calls.
pub struct CommentaryClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl CommentaryClient {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    /// Issue exactly one completion call and extract the commentary text.
    pub async fn generate(&self, request: &CommentaryRequest) -> Result<String, CommentaryError> {
        let user_prompt = build_user_prompt(&request.events, request.game_state.as_ref());
        debug!(
            "Commentary prompt: {} events, {} chars",
            request.events.len(),
            user_prompt.len()
        );

        let body = json!({
            "model": request.model.as_deref().unwrap_or(DEFAULT_MODEL),
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt},
            ],
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        });

        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CommentaryError::Api { status, body });
        }

        let completion: Value = resp.json().await?;
        extract_commentary(&completion)
    }
}

/// Pull the first choice's trimmed message content out of a completion.
pub(crate) fn extract_commentary(completion: &Value) -> Result<String, CommentaryError> {
    let choices = completion
        .get("choices")
        .and_then(Value::as_array)
        .filter(|choices| !choices.is_empty())
        .ok_or_else(|| CommentaryError::MalformedResponse("no choices in completion".into()))?;

    let content = choices[0]
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| CommentaryError::MalformedResponse("choice has no message content".into()))?;

    let commentary = content.trim();
    if commentary.is_empty() {
        return Err(CommentaryError::EmptyCompletion);
    }
    Ok(commentary.to_string())
}
