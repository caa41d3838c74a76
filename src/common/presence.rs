// Presence formatting and publishing
//
// Formatters are pure functions from a SessionState snapshot to a payload;
// the same snapshot always yields the same payload. Publishing is
// fire-and-forget: the Discord IPC client is slow and fallible, so it lives
// on its own worker thread behind a channel, and the router never waits on it.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use discord_rich_presence::{activity, DiscordIpc, DiscordIpcClient};
use tracing::{debug, info, warn};

use crate::common::state::SessionState;

pub const GAME_IMAGE_KEY: &str = "f1_23_logo";
pub const GAME_IMAGE_TEXT: &str = "F1 23";

const BUTTON_LABEL: &str = "Get F1 Presence Bridge";
const BUTTON_URL: &str = "https://github.com/f1rpc/f1-presence-bridge";

/// One fully formatted presence, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresencePayload {
    pub details: String,
    pub state: String,
    pub large_image_key: String,
    pub large_image_text: String,
    pub button: Option<(String, String)>,
    pub start_timestamp: Option<i64>,
}

fn footer_button() -> Option<(String, String)> {
    Some((BUTTON_LABEL.to_string(), BUTTON_URL.to_string()))
}

fn track_image(state: &SessionState) -> (String, String) {
    if state.track_image_key.is_empty() {
        (GAME_IMAGE_KEY.to_string(), GAME_IMAGE_TEXT.to_string())
    } else {
        (state.track_image_key.clone(), state.track.clone())
    }
}

/// Default payload shown when no active session is known.
pub fn idle(started_at: Option<i64>) -> PresencePayload {
    PresencePayload {
        details: "Idle".to_string(),
        state: String::new(),
        large_image_key: GAME_IMAGE_KEY.to_string(),
        large_image_text: GAME_IMAGE_TEXT.to_string(),
        button: footer_button(),
        start_timestamp: started_at,
    }
}

/// Pre-race lobby payload. The local player is excluded from the count, which
/// goes negative for an empty lobby report; the noun stays singular then.
pub fn lobby(state: &SessionState) -> PresencePayload {
    let others = i64::from(state.lobby_player_count) - 1;
    let noun = if others <= 1 { "player" } else { "players" };
    PresencePayload {
        details: "In the menus".to_string(),
        state: format!("Waiting in the lobby with {others} other {noun}"),
        large_image_key: GAME_IMAGE_KEY.to_string(),
        large_image_text: GAME_IMAGE_TEXT.to_string(),
        button: footer_button(),
        start_timestamp: None,
    }
}

/// In-session payload, selected by session-type id. Practice and qualifying
/// show team and conditions, races add the lap counter and position, time
/// trial shows track and platform only. Ids outside the three ranges
/// (including 0, "Unknown") publish nothing.
pub fn for_session(state: &SessionState) -> Option<PresencePayload> {
    let (image_key, image_text) = track_image(state);
    match state.session_type_id {
        1..=9 => Some(PresencePayload {
            details: format!("{} - {}", state.session_type, state.track),
            state: format!(
                "Racing for {} | Conditions: {}",
                state.team_name, state.weather_conditions
            ),
            large_image_key: image_key,
            large_image_text: image_text,
            button: footer_button(),
            start_timestamp: None,
        }),
        10..=12 => Some(PresencePayload {
            details: format!(
                "{} - {} | Lap {} / {} | {}% complete",
                state.session_type,
                state.track,
                state.lap_number,
                state.total_laps,
                state.race_completion_pct
            ),
            state: format!(
                "Racing for {} | P{} / P{} | Conditions: {}",
                state.team_name,
                state.current_position,
                state.total_participants,
                state.weather_conditions
            ),
            large_image_key: image_key,
            large_image_text: image_text,
            button: footer_button(),
            start_timestamp: None,
        }),
        13 => Some(PresencePayload {
            details: format!("{} - {}", state.session_type, state.track),
            state: format!("Platform: {}", state.player_platform),
            large_image_key: image_key,
            large_image_text: image_text,
            button: footer_button(),
            start_timestamp: None,
        }),
        _ => None,
    }
}

/// Generic end-of-session payload for anything that was not a race.
pub fn session_completed(state: &SessionState) -> PresencePayload {
    let (image_key, image_text) = track_image(state);
    PresencePayload {
        details: format!("Session Completed | Track: {}", state.track),
        state: format!("Racing for {}", state.team_name),
        large_image_key: image_key,
        large_image_text: image_text,
        button: footer_button(),
        start_timestamp: None,
    }
}

/// Outcome-specific payload for a classified race result. Statuses without a
/// presence representation (invalid, inactive, active) yield `None`.
pub fn race_result(state: &SessionState) -> Option<PresencePayload> {
    let (image_key, image_text) = track_image(state);
    let (details, status_line) = match state.final_result_status {
        3 => (
            format!(
                "Finished: P{} / P{} | Started: P{} | Track: {}",
                state.final_position,
                state.total_participants,
                state.final_grid_position,
                state.track
            ),
            format!(
                "Racing for {} | {} points earned",
                state.team_name, state.final_points
            ),
        ),
        4 => (
            format!(
                "DNF | Started: P{} | Track: {}",
                state.final_grid_position, state.track
            ),
            format!("Racing for {}", state.team_name),
        ),
        5 => (
            format!(
                "Disqualified | Started: P{} | Track: {}",
                state.final_grid_position, state.track
            ),
            format!("Racing for {}", state.team_name),
        ),
        6 => (
            format!("Not Classified | Track: {}", state.track),
            format!("Racing for {}", state.team_name),
        ),
        7 => (
            format!(
                "Retired | Started: P{} | Track: {}",
                state.final_grid_position, state.track
            ),
            format!("Racing for {}", state.team_name),
        ),
        _ => return None,
    };
    Some(PresencePayload {
        details,
        state: status_line,
        large_image_key: image_key,
        large_image_text: image_text,
        button: footer_button(),
        start_timestamp: None,
    })
}

/// Sink for formatted payloads. Implementations must not block the caller.
pub trait PresencePublisher: Send {
    fn publish(&self, payload: PresencePayload);
}

/// Handle to the Discord IPC worker thread.
///
/// Dropping the last handle closes the channel and lets the worker exit.
pub struct DiscordPresence {
    tx: Sender<PresencePayload>,
}

impl DiscordPresence {
    /// Spawns the worker. The Discord client may not be running yet; the
    /// worker keeps retrying the connection on each payload until it is.
    pub fn spawn(app_id: &str) -> Self {
        let (tx, rx) = mpsc::channel();
        let app_id = app_id.to_string();
        thread::Builder::new()
            .name("discord-ipc".to_string())
            .spawn(move || worker(app_id, rx))
            .expect("failed to spawn discord-ipc thread");
        Self { tx }
    }
}

impl PresencePublisher for DiscordPresence {
    fn publish(&self, payload: PresencePayload) {
        if self.tx.send(payload).is_err() {
            warn!("discord worker is gone, dropping presence update");
        }
    }
}

fn worker(app_id: String, rx: Receiver<PresencePayload>) {
    let mut client: Option<DiscordIpcClient> = None;
    let mut connected = false;
    let mut last_sent: Option<PresencePayload> = None;

    while let Ok(payload) = rx.recv() {
        // Session packets arrive twice a second; identical payloads are
        // skipped so the IPC socket only sees actual changes.
        if connected && last_sent.as_ref() == Some(&payload) {
            continue;
        }

        if client.is_none() {
            match DiscordIpcClient::new(&app_id) {
                Ok(c) => client = Some(c),
                Err(err) => {
                    warn!(%err, "failed to create Discord IPC client");
                    continue;
                }
            }
        }
        let Some(c) = client.as_mut() else { continue };

        if !connected {
            match c.connect() {
                Ok(()) => {
                    connected = true;
                    info!("connected to Discord");
                }
                Err(err) => {
                    debug!(%err, "Discord not reachable, will retry on next update");
                    continue;
                }
            }
        }

        if let Err(err) = c.set_activity(build_activity(&payload)) {
            warn!(%err, "failed to set Discord activity, reconnecting on next update");
            connected = false;
            continue;
        }
        last_sent = Some(payload);
    }
}

fn build_activity(payload: &PresencePayload) -> activity::Activity<'_> {
    let mut act = activity::Activity::new().details(&payload.details).assets(
        activity::Assets::new()
            .large_image(&payload.large_image_key)
            .large_text(&payload.large_image_text),
    );
    if !payload.state.is_empty() {
        act = act.state(&payload.state);
    }
    if let Some((label, url)) = &payload.button {
        act = act.buttons(vec![activity::Button::new(label, url)]);
    }
    if let Some(start) = payload.start_timestamp {
        act = act.timestamps(activity::Timestamps::new().start(start));
    }
    act
}

#[cfg(test)]
mod tests {
    use super::*;

    fn race_state() -> SessionState {
        SessionState {
            session_type_id: 10,
            session_type: "Race".to_string(),
            track: "Monaco".to_string(),
            track_image_key: "monaco".to_string(),
            team_name: "Scuderia Ferrari".to_string(),
            weather_conditions: "Clear".to_string(),
            lap_number: 2,
            total_laps: 10,
            race_completion_pct: 11.11,
            current_position: 4,
            total_participants: 20,
            ..SessionState::default()
        }
    }

    #[test]
    fn formatter_is_idempotent() {
        let state = race_state();
        assert_eq!(for_session(&state), for_session(&state));
        assert_eq!(lobby(&state), lobby(&state));
        assert_eq!(idle(Some(1000)), idle(Some(1000)));
    }

    #[test]
    fn race_variant_shows_laps_position_and_completion() {
        let payload = for_session(&race_state()).unwrap();
        assert_eq!(
            payload.details,
            "Race - Monaco | Lap 2 / 10 | 11.11% complete"
        );
        assert_eq!(
            payload.state,
            "Racing for Scuderia Ferrari | P4 / P20 | Conditions: Clear"
        );
        assert_eq!(payload.large_image_key, "monaco");
    }

    #[test]
    fn practice_variant_has_no_lap_counter() {
        let mut state = race_state();
        state.session_type_id = 3;
        state.session_type = "Practice 3".to_string();
        let payload = for_session(&state).unwrap();
        assert_eq!(payload.details, "Practice 3 - Monaco");
        assert_eq!(
            payload.state,
            "Racing for Scuderia Ferrari | Conditions: Clear"
        );
    }

    #[test]
    fn time_trial_variant_shows_platform_only() {
        let mut state = race_state();
        state.session_type_id = 13;
        state.session_type = "Time Trial".to_string();
        state.player_platform = "Steam".to_string();
        let payload = for_session(&state).unwrap();
        assert_eq!(payload.details, "Time Trial - Monaco");
        assert_eq!(payload.state, "Platform: Steam");
    }

    #[test]
    fn unknown_session_type_publishes_nothing() {
        let mut state = race_state();
        state.session_type_id = 0;
        assert!(for_session(&state).is_none());
        state.session_type_id = 14;
        assert!(for_session(&state).is_none());
    }

    #[test]
    fn lobby_count_excludes_the_local_player() {
        let mut state = SessionState::new();

        state.lobby_player_count = 2;
        assert_eq!(
            lobby(&state).state,
            "Waiting in the lobby with 1 other player"
        );

        state.lobby_player_count = 5;
        assert_eq!(
            lobby(&state).state,
            "Waiting in the lobby with 4 other players"
        );

        // An empty lobby report goes negative; the noun stays singular.
        state.lobby_player_count = 0;
        assert_eq!(
            lobby(&state).state,
            "Waiting in the lobby with -1 other player"
        );
    }

    #[test]
    fn race_result_variants() {
        let mut state = race_state();
        state.final_position = 1;
        state.final_grid_position = 4;
        state.final_points = 25;

        state.final_result_status = 3;
        let finished = race_result(&state).unwrap();
        assert_eq!(
            finished.details,
            "Finished: P1 / P20 | Started: P4 | Track: Monaco"
        );
        assert_eq!(
            finished.state,
            "Racing for Scuderia Ferrari | 25 points earned"
        );

        state.final_result_status = 4;
        assert!(race_result(&state)
            .unwrap()
            .details
            .starts_with("DNF | Started: P4"));

        state.final_result_status = 5;
        assert!(race_result(&state)
            .unwrap()
            .details
            .starts_with("Disqualified"));

        state.final_result_status = 6;
        assert_eq!(
            race_result(&state).unwrap().details,
            "Not Classified | Track: Monaco"
        );

        state.final_result_status = 7;
        assert!(race_result(&state).unwrap().details.starts_with("Retired"));

        // Invalid / inactive / active have no presence representation.
        for status in [0, 1, 2, 8] {
            state.final_result_status = status;
            assert!(race_result(&state).is_none());
        }
    }

    #[test]
    fn missing_track_image_falls_back_to_the_game_logo() {
        let mut state = race_state();
        state.track_image_key = String::new();
        let payload = session_completed(&state);
        assert_eq!(payload.large_image_key, GAME_IMAGE_KEY);
        assert_eq!(payload.large_image_text, GAME_IMAGE_TEXT);
    }
}
