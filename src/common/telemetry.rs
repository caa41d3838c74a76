// Telemetry decoding module for the F1 23 UDP protocol
//
// The game emits little-endian binary packets on port 20777. Every packet
// starts with the same 29-byte header; the packet id at byte 6 selects the
// body layout. Only the packet kinds the presence engine consumes are decoded
// here, and only the fields it needs - everything else is skipped by offset.

use std::convert::TryFrom;

use crate::common::util::{BridgeError, BridgeResult};

/// Fixed car-array length used by every per-car packet body.
pub const MAX_CARS: usize = 22;

/// Size of the packet header shared by all packet kinds.
pub const HEADER_LEN: usize = 29;

// Canonical F1 23 packet sizes, header included.
const SESSION_PACKET_LEN: usize = 644;
const LAP_PACKET_LEN: usize = 1131;
const EVENT_PACKET_LEN: usize = 45;
const PARTICIPANTS_PACKET_LEN: usize = 1306;
const FINAL_CLASSIFICATION_PACKET_LEN: usize = 1020;
const LOBBY_PACKET_LEN: usize = 1218;

// Packet ids, per the published protocol.
const PACKET_ID_SESSION: u8 = 1;
const PACKET_ID_LAP: u8 = 2;
const PACKET_ID_EVENT: u8 = 3;
const PACKET_ID_PARTICIPANTS: u8 = 4;
const PACKET_ID_FINAL_CLASSIFICATION: u8 = 8;
const PACKET_ID_LOBBY: u8 = 9;

/// Helper function to convert bytes to f32
fn f32_at(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(<[u8; 4]>::try_from(&data[offset..offset + 4]).expect("bytes_to_f32"))
}

/// Helper function to read a fixed-size, NUL-terminated UTF-8 name field
fn name_at(data: &[u8], offset: usize, len: usize) -> String {
    let raw = &data[offset..offset + len];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(len);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Per-car slice of a lap-data packet.
#[derive(Debug, Clone, Copy, Default)]
pub struct CarLapData {
    pub car_position: u8,
    pub current_lap_num: u8,
    pub num_pit_stops: u8,
    pub total_warnings: u8,
}

#[derive(Debug, Clone)]
pub struct LapUpdate {
    pub player_car_index: usize,
    pub cars: Vec<CarLapData>,
}

#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub weather_id: u8,
    pub total_laps: u8,
    pub session_type_id: u8,
    pub track_id: i8,
    pub network_game: bool,
    pub safety_car_periods: u8,
    pub virtual_safety_car_periods: u8,
    pub red_flag_periods: u8,
}

#[derive(Debug, Clone, Default)]
pub struct ParticipantEntry {
    pub team_id: u8,
    pub platform_id: u8,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ParticipantsUpdate {
    pub player_car_index: usize,
    pub num_active_cars: u8,
    pub participants: Vec<ParticipantEntry>,
}

#[derive(Debug, Clone, Copy)]
pub struct LobbyUpdate {
    pub num_players: u8,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FinalClassificationEntry {
    pub position: u8,
    pub grid_position: u8,
    pub points: u8,
    pub result_status: u8,
}

#[derive(Debug, Clone)]
pub struct FinalClassificationUpdate {
    pub player_car_index: usize,
    pub num_cars: u8,
    pub cars: Vec<FinalClassificationEntry>,
}

/// Fastest-lap / speed-trap notifications. Presence-irrelevant, decoded for
/// diagnostics only.
#[derive(Debug, Clone)]
pub enum EventDetailsUpdate {
    FastestLap { vehicle_index: usize, lap_time: f32 },
    SpeedTrap { vehicle_index: usize, speed: f32 },
    Other { code: [u8; 4] },
}

/// One fully decoded telemetry event, ready for the router.
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    Lap(LapUpdate),
    Session(SessionUpdate),
    Participants(ParticipantsUpdate),
    Lobby(LobbyUpdate),
    FinalClassification(FinalClassificationUpdate),
    EventDetails(EventDetailsUpdate),
}

fn require_len(data: &[u8], need: usize) -> BridgeResult {
    if data.len() < need {
        return Err(BridgeError::Truncated {
            got: data.len(),
            need,
        });
    }
    Ok(())
}

/// Decode one datagram into a telemetry event.
///
/// Returns `Ok(None)` for packet kinds the presence engine does not consume
/// (motion, car telemetry, car status, ...). Truncated packets of a consumed
/// kind are an error so the caller can report them.
pub fn decode_event(data: &[u8]) -> BridgeResult<Option<TelemetryEvent>> {
    require_len(data, HEADER_LEN)?;
    let packet_id = data[6];
    let player_car_index = data[27] as usize;
    let body = &data[HEADER_LEN..];

    let event = match packet_id {
        PACKET_ID_SESSION => {
            require_len(data, SESSION_PACKET_LEN)?;
            TelemetryEvent::Session(SessionUpdate {
                weather_id: body[0],
                total_laps: body[3],
                session_type_id: body[6],
                track_id: body[7] as i8,
                network_game: body[125] == 1,
                safety_car_periods: body[612],
                virtual_safety_car_periods: body[613],
                red_flag_periods: body[614],
            })
        }
        PACKET_ID_LAP => {
            require_len(data, LAP_PACKET_LEN)?;
            let cars = (0..MAX_CARS)
                .map(|i| {
                    let car = &body[i * 50..];
                    CarLapData {
                        car_position: car[30],
                        current_lap_num: car[31],
                        num_pit_stops: car[33],
                        total_warnings: car[37],
                    }
                })
                .collect();
            TelemetryEvent::Lap(LapUpdate {
                player_car_index,
                cars,
            })
        }
        PACKET_ID_EVENT => {
            require_len(data, EVENT_PACKET_LEN)?;
            let code = <[u8; 4]>::try_from(&body[0..4]).expect("event_code");
            let details = match &code {
                b"FTLP" => EventDetailsUpdate::FastestLap {
                    vehicle_index: body[4] as usize,
                    lap_time: f32_at(body, 5),
                },
                b"SPTP" => EventDetailsUpdate::SpeedTrap {
                    vehicle_index: body[4] as usize,
                    speed: f32_at(body, 5),
                },
                _ => EventDetailsUpdate::Other { code },
            };
            TelemetryEvent::EventDetails(details)
        }
        PACKET_ID_PARTICIPANTS => {
            require_len(data, PARTICIPANTS_PACKET_LEN)?;
            let participants = (0..MAX_CARS)
                .map(|i| {
                    let entry = &body[1 + i * 58..];
                    ParticipantEntry {
                        team_id: entry[3],
                        platform_id: entry[57],
                        name: name_at(entry, 7, 48),
                    }
                })
                .collect();
            TelemetryEvent::Participants(ParticipantsUpdate {
                player_car_index,
                num_active_cars: body[0],
                participants,
            })
        }
        PACKET_ID_FINAL_CLASSIFICATION => {
            require_len(data, FINAL_CLASSIFICATION_PACKET_LEN)?;
            let cars = (0..MAX_CARS)
                .map(|i| {
                    let entry = &body[1 + i * 45..];
                    FinalClassificationEntry {
                        position: entry[0],
                        grid_position: entry[2],
                        points: entry[3],
                        result_status: entry[5],
                    }
                })
                .collect();
            TelemetryEvent::FinalClassification(FinalClassificationUpdate {
                player_car_index,
                num_cars: body[0],
                cars,
            })
        }
        PACKET_ID_LOBBY => {
            require_len(data, LOBBY_PACKET_LEN)?;
            TelemetryEvent::Lobby(LobbyUpdate {
                num_players: body[0],
            })
        }
        _ => return Ok(None),
    };

    Ok(Some(event))
}
