//! Game event and game-state summarization.
//!
//! Pure, total functions that turn the loosely shaped JSON the game client
//! sends into short text fragments and a fixed-shape state summary. Nothing
//! here can fail: unknown event types produce an empty fragment and missing
//! fields resolve to documented defaults.

use serde::Deserialize;
use serde_json::Value;

/// One game event as reported by the client. `data` is free-form.
#[derive(Debug, Clone, Deserialize)]
pub struct GameEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

/// A card as it appears in a hand. Numeric fields default to 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub name: String,
    pub icon: String,
    pub card_type: String,
    pub cost: i64,
    pub power: i64,
    pub heal: i64,
    pub draw: i64,
}

/// A buff on either actor. Only the name matters for commentary.
#[derive(Debug, Clone, PartialEq)]
pub struct Buff {
    pub name: String,
}

/// Display-ready snapshot of one side of the board.
#[derive(Debug, Clone, Default)]
pub struct ActorSummary {
    pub health: i64,
    pub max_health: i64,
    pub mana: i64,
    pub max_mana: i64,
    /// Present only when the input carried hand data.
    pub hand: Option<Vec<Card>>,
    /// Present only when the input carried buff data.
    pub buffs: Option<Vec<Buff>>,
}

/// Fixed-shape summary of an arbitrarily shaped game-state object.
#[derive(Debug, Clone)]
pub struct GameStateSummary {
    pub player: ActorSummary,
    pub opponent: ActorSummary,
    pub turn: String,
    pub turn_number: i64,
}

/// Convert one event into a short fragment, or an empty string for
/// unrecognized event types. Callers must skip empty fragments.
pub fn event_to_text(event: &GameEvent) -> String {
    let data = &event.data;
    match event.kind.as_str() {
        "game_start" => "the game has started!".to_string(),
        "card_played" => {
            let actor = actor_label(data.get("player"));
            let card = data.get("card");
            let name = str_field(card, "name", "unknown card");
            let icon = str_field(card, "icon", "");
            format!("{actor} played {icon}{name}")
        }
        "damage_dealt" => {
            let target = actor_label(data.get("target"));
            let amount = int_field(Some(data), "amount", 0);
            format!("{target} took {amount} damage")
        }
        "heal" => {
            let target = actor_label(data.get("target"));
            let amount = int_field(Some(data), "amount", 0);
            format!("{target} restored {amount} health")
        }
        "turn_start" => format!("{}'s turn began", actor_label(data.get("player"))),
        "turn_end" => format!("{}'s turn ended", actor_label(data.get("player"))),
        "game_over" => format!("game over! {} wins", actor_label(data.get("winner"))),
        _ => String::new(),
    }
}

/// Summarize a game-state object. Every missing field resolves to a
/// default; health/mana ranges are not validated or clamped.
pub fn summarize_game_state(state: &Value) -> GameStateSummary {
    GameStateSummary {
        player: summarize_actor(state.get("player")),
        opponent: summarize_actor(state.get("opponent")),
        turn: str_field(Some(state), "turn", "player"),
        turn_number: int_field(Some(state), "turnNumber", 1),
    }
}

fn summarize_actor(actor: Option<&Value>) -> ActorSummary {
    ActorSummary {
        health: int_field(actor, "health", 100),
        max_health: int_field(actor, "maxHealth", 100),
        mana: int_field(actor, "mana", 0),
        max_mana: int_field(actor, "maxMana", 0),
        hand: actor
            .and_then(|a| a.get("hand"))
            .and_then(Value::as_array)
            .map(|cards| cards.iter().map(card_from_value).collect()),
        buffs: actor
            .and_then(|a| a.get("buffs"))
            .and_then(Value::as_array)
            .map(|buffs| {
                buffs
                    .iter()
                    .map(|b| Buff {
                        name: str_field(Some(b), "name", ""),
                    })
                    .collect()
            }),
    }
}

fn card_from_value(card: &Value) -> Card {
    let card = Some(card);
    Card {
        name: str_field(card, "name", ""),
        icon: str_field(card, "icon", ""),
        card_type: str_field(card, "type", ""),
        cost: int_field(card, "cost", 0),
        power: int_field(card, "power", 0),
        heal: int_field(card, "heal", 0),
        draw: int_field(card, "draw", 0),
    }
}

/// The literal value "player" maps to the player label; anything else
/// (including absence) is the opponent.
fn actor_label(value: Option<&Value>) -> &'static str {
    if value.and_then(Value::as_str) == Some("player") {
        "player"
    } else {
        "opponent"
    }
}

fn str_field(value: Option<&Value>, key: &str, default: &str) -> String {
    value
        .and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn int_field(value: Option<&Value>, key: &str, default: i64) -> i64 {
    value
        .and_then(|v| v.get(key))
        .and_then(Value::as_i64)
        .unwrap_or(default)
}
