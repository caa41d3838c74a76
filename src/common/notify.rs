// Race-result webhook notifications
//
// Builds one Discord-webhook embed per completed race and hands it to a
// detached task. Delivery failures are logged and swallowed; the transport is
// never retried and never touches the router's critical path.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::common::lookup;
use crate::common::state::SessionState;

// Accent colors by finishing position.
const COLOR_GOLD: u32 = 0xFFD700;
const COLOR_SILVER: u32 = 0xC0C0C0;
const COLOR_BRONZE: u32 = 0xCD7F32;
const COLOR_POINTS: u32 = 0x0E8EE9;
const COLOR_NEUTRAL: u32 = 0x95A5A6;

pub fn accent_color(position: u8) -> u32 {
    match position {
        1 => COLOR_GOLD,
        2 => COLOR_SILVER,
        3 => COLOR_BRONZE,
        4..=10 => COLOR_POINTS,
        _ => COLOR_NEUTRAL,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookMessage {
    pub username: String,
    pub embeds: Vec<Embed>,
}

fn field(name: &str, value: impl Into<String>) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value: value.into(),
        inline: true,
    }
}

/// Grid-to-finish movement, e.g. "P4 to P1 (+3)".
fn grid_delta(grid: u8, finish: u8) -> String {
    let delta = i32::from(grid) - i32::from(finish);
    let signed = if delta > 0 {
        format!("+{delta}")
    } else {
        delta.to_string()
    };
    format!("P{grid} to P{finish} ({signed})")
}

/// Summarize a finished race from a SessionState snapshot. Pure; the caller
/// supplies the clock so the builder is deterministic under test.
pub fn race_notification(state: &SessionState, when: DateTime<Utc>) -> WebhookMessage {
    let embed = Embed {
        title: format!("Race Results: {}", state.track),
        color: accent_color(state.final_position),
        fields: vec![
            field("Date", when.format("%d %b %Y").to_string()),
            field("Time", format!("{} UTC", when.format("%H:%M"))),
            field("Driver", state.player_name.clone()),
            field("Track", state.track.clone()),
            field("Team", state.team_name.clone()),
            field(
                "Result",
                lookup::result_status(state.final_result_status).to_string(),
            ),
            field("Grid to Finish", grid_delta(state.final_grid_position, state.final_position)),
            field("Points", state.final_points.to_string()),
            field("Pit Stops", state.num_pit_stops.to_string()),
            field("Safety Cars", state.safety_cars.to_string()),
            field("Virtual Safety Cars", state.virtual_safety_cars.to_string()),
            field("Red Flags", state.red_flags.to_string()),
            field("Warnings", state.total_warnings.to_string()),
        ],
        timestamp: when.to_rfc3339(),
    };
    WebhookMessage {
        username: "F1 Presence Bridge".to_string(),
        embeds: vec![embed],
    }
}

/// Sink for completed-race notifications. Implementations must not block.
pub trait ResultNotifier: Send {
    fn notify(&self, message: WebhookMessage);
}

pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

impl ResultNotifier for WebhookNotifier {
    fn notify(&self, message: WebhookMessage) {
        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&message).send().await {
                Ok(response) if !response.status().is_success() => {
                    warn!(status = %response.status(), "webhook rejected the race notification");
                }
                Ok(_) => debug!("race notification delivered"),
                Err(err) => warn!(%err, "failed to deliver race notification"),
            }
        });
    }
}
