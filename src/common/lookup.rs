// Static lookup tables for the small integer codes the game emits
//
// Track and session-type ids are closed, versioned enumerations: a miss means
// the table is out of date with the game and the operator must know, so those
// lookups return an error. Weather, team, platform and result-status codes
// degrade to a safe label instead.

use crate::common::util::{BridgeError, BridgeResult};

/// Team id to display name. Covers the F1 23 roster plus the classic
/// (2020-2022) and F2 entries the game can report in invitational events.
pub const TEAMS: &[(u8, &str)] = &[
    (0, "Mercedes-AMG Petronas F1 Team"),
    (1, "Scuderia Ferrari"),
    (2, "Oracle Red Bull Racing"),
    (3, "Williams Racing"),
    (4, "Aston Martin Aramco Cognizant F1 Team"),
    (5, "BWT Alpine F1 Team"),
    (6, "Scuderia AlphaTauri"),
    (7, "Haas F1 Team"),
    (8, "McLaren F1 Team"),
    (9, "Alfa Romeo F1 Team ORLEN"),
    (85, "Mercedes (2020)"),
    (86, "Ferrari (2020)"),
    (87, "Red Bull (2020)"),
    (88, "Williams (2020)"),
    (89, "Racing Point (2020)"),
    (90, "Renault (2020)"),
    (91, "AlphaTauri (2020)"),
    (92, "Haas (2020)"),
    (93, "McLaren (2020)"),
    (94, "Alfa Romeo (2020)"),
    (95, "Aston Martin DB11 V12"),
    (96, "Aston Martin Vantage F1 Edition"),
    (97, "Aston Martin Vantage Safety Car"),
    (98, "Ferrari F8 Tributo"),
    (99, "Ferrari Roma"),
    (100, "McLaren 720S"),
    (101, "McLaren Artura"),
    (102, "Mercedes AMG GT Black Series Safety Car"),
    (103, "Mercedes AMG GTR Pro"),
    (104, "F1 Custom Team"),
    (106, "Prema (2021)"),
    (107, "Uni-Virtuosi (2021)"),
    (108, "Carlin (2021)"),
    (109, "Hitech (2021)"),
    (110, "Art GP (2021)"),
    (111, "MP Motorsport (2021)"),
    (112, "Charouz (2021)"),
    (113, "Dams (2021)"),
    (114, "Campos (2021)"),
    (115, "BWT (2021)"),
    (116, "Trident (2021)"),
    (117, "Mercedes AMG GT Black Series"),
    (118, "Mercedes (2022)"),
    (119, "Ferrari (2022)"),
    (120, "Red Bull Racing (2022)"),
    (121, "Williams (2022)"),
    (122, "Aston Martin (2022)"),
    (123, "Alpine (2022)"),
    (124, "AlphaTauri (2022)"),
    (125, "Haas (2022)"),
    (126, "McLaren (2022)"),
    (127, "Alfa Romeo (2022)"),
    (128, "Konnersport (2022)"),
    (129, "Konnersport"),
    (130, "Prema (2022)"),
    (131, "Uni-Virtuosi (2022)"),
    (132, "Carlin (2022)"),
    (133, "MP Motorsport (2022)"),
    (134, "Charouz (2022)"),
    (135, "Dams (2022)"),
    (136, "Campos (2022)"),
    (137, "Van Amersfoort Racing (2022)"),
    (138, "Trident (2022)"),
    (139, "Hitech (2022)"),
    (140, "Art GP (2022)"),
];

/// Track id to display name and presence image key.
pub const TRACKS: &[(i8, &str, &str)] = &[
    (0, "Australia: Melbourne", "melbourne"),
    (1, "France: Le Castellet", "paul_ricard"),
    (2, "China: Shanghai", "shanghai"),
    (3, "Bahrain: Sakhir", "sakhir"),
    (4, "Spain: Barcelona-Catalunya", "catalunya"),
    (5, "Monaco", "monaco"),
    (6, "Canada: Montreal", "montreal"),
    (7, "UK: Silverstone", "silverstone"),
    (8, "Germany: Hockenheim", "hockenheim"),
    (9, "Hungary: Budapest", "hungaroring"),
    (10, "Belgium: Spa-Francorchamps", "spa"),
    (11, "Italy: Monza", "monza"),
    (12, "Singapore", "singapore"),
    (13, "Japan: Suzuka", "suzuka"),
    (14, "Abu Dhabi: Yas Marina", "abu_dhabi"),
    (15, "USA (Texas): COTA", "texas"),
    (16, "Brazil: Sao Paolo", "brazil"),
    (17, "Austria: Spielberg", "austria"),
    (18, "Russia: Sochi", "sochi"),
    (19, "Mexico", "mexico"),
    (20, "Azerbaijan: Baku", "baku"),
    (21, "Bahrain: Sakhir (Short)", "sakhir_short"),
    (22, "UK: Silverstone (Short)", "silverstone_short"),
    (23, "USA (Texas): COTA (Short)", "texas_short"),
    (24, "Japan: Suzuka (Short)", "suzuka_short"),
    (25, "Vietnam: Hanoi", "hanoi"),
    (26, "Netherlands: Zandvoort", "zandvoort"),
    (27, "Italy: Imola", "imola"),
    (28, "Portugal: Portimao", "portimao"),
    (29, "Saudi Arabia: Jeddah", "jeddah"),
    (30, "USA (Florida): Miami", "miami"),
    (31, "USA (Nevada): Las Vegas", "las_vegas"),
    (32, "Qatar: Losail", "losail"),
];

pub const SESSION_TYPES: &[(u8, &str)] = &[
    (0, "Unknown"),
    (1, "Practice 1"),
    (2, "Practice 2"),
    (3, "Practice 3"),
    (4, "Short Practice"),
    (5, "Qualifying 1"),
    (6, "Qualifying 2"),
    (7, "Qualifying 3"),
    (8, "Short Qualifying"),
    (9, "One-Shot Qualifying"),
    (10, "Race"),
    (11, "Race 2"),
    (12, "Race 3"),
    (13, "Time Trial"),
];

pub const WEATHER: &[(u8, &str)] = &[
    (0, "Clear"),
    (1, "Light Cloud"),
    (2, "Overcast"),
    (3, "Light Rain"),
    (4, "Heavy Rain"),
    (5, "Storm"),
];

pub const PLATFORMS: &[(u8, &str)] = &[
    (1, "Steam"),
    (3, "PlayStation"),
    (4, "Xbox"),
    (6, "Origin"),
    (255, "Unknown"),
];

pub const RESULT_STATUSES: &[(u8, &str)] = &[
    (0, "Invalid"),
    (1, "Inactive"),
    (2, "Active"),
    (3, "Finished"),
    (4, "Did Not Finish"),
    (5, "Disqualified"),
    (6, "Not Classified"),
    (7, "Retired"),
];

/// Resolve a track id to its display name and presence image key.
pub fn track(id: i8) -> BridgeResult<(&'static str, &'static str)> {
    TRACKS
        .iter()
        .find(|(track_id, _, _)| *track_id == id)
        .map(|(_, name, image)| (*name, *image))
        .ok_or(BridgeError::UnknownTrackId(id))
}

/// Resolve a session type id to its display name.
pub fn session_type(id: u8) -> BridgeResult<&'static str> {
    SESSION_TYPES
        .iter()
        .find(|(type_id, _)| *type_id == id)
        .map(|(_, name)| *name)
        .ok_or(BridgeError::UnknownSessionTypeId(id))
}

/// Weather labels degrade to "Unknown" for codes a newer game build may add.
pub fn weather(id: u8) -> &'static str {
    WEATHER
        .iter()
        .find(|(weather_id, _)| *weather_id == id)
        .map_or("Unknown", |(_, name)| *name)
}

/// Team names degrade to an empty label, matching how custom and modded
/// entries show up in the game itself.
pub fn team(id: u8) -> &'static str {
    TEAMS
        .iter()
        .find(|(team_id, _)| *team_id == id)
        .map_or("", |(_, name)| *name)
}

pub fn platform(id: u8) -> &'static str {
    PLATFORMS
        .iter()
        .find(|(platform_id, _)| *platform_id == id)
        .map_or("Unknown", |(_, name)| *name)
}

pub fn result_status(id: u8) -> &'static str {
    RESULT_STATUSES
        .iter()
        .find(|(status_id, _)| *status_id == id)
        .map_or("Unknown", |(_, name)| *name)
}

/// Assert the closed enumerations are gapless over their documented range.
/// Run once at startup; a gap here is a build defect, not a runtime surprise.
pub fn validate_tables() -> BridgeResult {
    for id in 0..=32i8 {
        track(id)?;
    }
    for id in 0..=13u8 {
        session_type(id)?;
    }
    for id in 0..=5u8 {
        if !WEATHER.iter().any(|(weather_id, _)| *weather_id == id) {
            return Err(BridgeError::Config(format!("weather table misses id {id}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_tables_are_gapless() {
        validate_tables().unwrap();
    }

    #[test]
    fn resolves_known_codes() {
        assert_eq!(track(5).unwrap(), ("Monaco", "monaco"));
        assert_eq!(track(32).unwrap().0, "Qatar: Losail");
        assert_eq!(session_type(10).unwrap(), "Race");
        assert_eq!(session_type(13).unwrap(), "Time Trial");
        assert_eq!(weather(0), "Clear");
        assert_eq!(team(2), "Oracle Red Bull Racing");
        assert_eq!(team(140), "Art GP (2022)");
        assert_eq!(platform(3), "PlayStation");
        assert_eq!(result_status(4), "Did Not Finish");
    }

    #[test]
    fn unknown_track_and_session_type_are_errors() {
        assert!(matches!(track(-1), Err(BridgeError::UnknownTrackId(-1))));
        assert!(matches!(
            track(33),
            Err(BridgeError::UnknownTrackId(33))
        ));
        assert!(matches!(
            session_type(14),
            Err(BridgeError::UnknownSessionTypeId(14))
        ));
    }

    #[test]
    fn soft_codes_degrade_to_safe_labels() {
        assert_eq!(weather(9), "Unknown");
        assert_eq!(team(50), "");
        assert_eq!(platform(0), "Unknown");
        assert_eq!(result_status(200), "Unknown");
    }
}
