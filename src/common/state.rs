// Aggregated race state, fed by every decoded event kind
//
// A single instance lives inside the router task for the whole process; the
// router is its only reader and writer. Id fields and their derived labels
// are always assigned inside the same apply call, so a label can never go
// stale relative to its id.

use tracing::warn;

use crate::common::lookup;
use crate::common::telemetry::{
    FinalClassificationUpdate, LapUpdate, LobbyUpdate, ParticipantsUpdate, SessionUpdate,
};
use crate::common::util::BridgeResult;

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub player_index: usize,
    pub lap_number: u8,
    pub total_laps: u8,
    pub current_position: u8,
    pub total_participants: u8,
    /// Lap 1 counts as 0%, the final lap as 100%, rounded to two decimals.
    pub race_completion_pct: f64,
    pub track_id: i8,
    pub track: String,
    pub track_image_key: String,
    pub session_type_id: u8,
    pub session_type: String,
    pub weather_id: u8,
    pub weather_conditions: String,
    pub team_id: u8,
    pub team_name: String,
    pub player_name: String,
    pub player_platform: String,
    pub lobby_player_count: i32,
    pub network_game: bool,
    pub final_position: u8,
    pub final_grid_position: u8,
    pub final_points: u8,
    pub final_result_status: u8,
    pub safety_cars: u8,
    pub virtual_safety_cars: u8,
    pub red_flags: u8,
    pub total_warnings: u8,
    pub num_pit_stops: u8,
    /// Guards the at-most-once race-result notification.
    pub notified_for_current_result: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the known session type is one of the race variants.
    pub fn is_race(&self) -> bool {
        (10..=12).contains(&self.session_type_id)
    }

    pub fn apply_lap(&mut self, lap: &LapUpdate) {
        self.player_index = lap.player_car_index;
        let Some(car) = lap.cars.get(self.player_index) else {
            warn!(
                player_index = self.player_index,
                cars = lap.cars.len(),
                "player index out of bounds in lap data"
            );
            return;
        };
        self.lap_number = car.current_lap_num;
        self.current_position = car.car_position;
        self.total_warnings = car.total_warnings;
        self.num_pit_stops = car.num_pit_stops;
        self.recompute_race_completion();
    }

    /// Applies a session update, or rejects the whole event when the track or
    /// session-type id is unknown. Nothing is mutated on rejection.
    pub fn apply_session(&mut self, session: &SessionUpdate) -> BridgeResult {
        let (track, track_image_key) = lookup::track(session.track_id)?;
        let session_type = lookup::session_type(session.session_type_id)?;

        self.track_id = session.track_id;
        self.track = track.to_string();
        self.track_image_key = track_image_key.to_string();
        self.session_type_id = session.session_type_id;
        self.session_type = session_type.to_string();
        self.weather_id = session.weather_id;
        self.weather_conditions = lookup::weather(session.weather_id).to_string();
        self.total_laps = session.total_laps;
        self.network_game = session.network_game;
        self.safety_cars = session.safety_car_periods;
        self.virtual_safety_cars = session.virtual_safety_car_periods;
        self.red_flags = session.red_flag_periods;
        self.recompute_race_completion();
        Ok(())
    }

    pub fn apply_participants(&mut self, participants: &ParticipantsUpdate) {
        self.player_index = participants.player_car_index;
        self.total_participants = participants.num_active_cars;
        match participants.participants.get(self.player_index) {
            Some(entry) => {
                self.team_id = entry.team_id;
                self.team_name = lookup::team(entry.team_id).to_string();
                self.player_name = if entry.name.is_empty() {
                    "Unknown".to_string()
                } else {
                    entry.name.clone()
                };
                self.player_platform = lookup::platform(entry.platform_id).to_string();
            }
            None => {
                warn!(
                    player_index = self.player_index,
                    cars = participants.participants.len(),
                    "player index out of bounds in participants data"
                );
                self.player_name = "Unknown".to_string();
            }
        }
    }

    pub fn apply_lobby(&mut self, lobby: &LobbyUpdate) {
        self.lobby_player_count = i32::from(lobby.num_players);
    }

    pub fn apply_final_classification(&mut self, classification: &FinalClassificationUpdate) {
        self.player_index = classification.player_car_index;
        let Some(entry) = classification.cars.get(self.player_index) else {
            warn!(
                player_index = self.player_index,
                cars = classification.cars.len(),
                "player index out of bounds in final classification"
            );
            return;
        };
        self.final_position = entry.position;
        self.final_grid_position = entry.grid_position;
        self.final_points = entry.points;
        self.final_result_status = entry.result_status;
    }

    fn recompute_race_completion(&mut self) {
        self.race_completion_pct = if self.lap_number <= 1 || self.total_laps <= 1 {
            0.0
        } else {
            let pct = f64::from(self.lap_number - 1) / f64::from(self.total_laps - 1) * 100.0;
            (pct * 100.0).round() / 100.0
        };
    }
}
