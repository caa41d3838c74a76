use std::time::Duration;

use thiserror::Error;

/// Default port the game sends UDP telemetry to.
pub const DEFAULT_TELEMETRY_PORT: u16 = 20777;

/// How long after a final classification the presence falls back to idle.
/// The game never tells us when the post-race screen is dismissed; 15 seconds
/// is assumed to be enough.
pub const IDLE_RESET_DELAY: Duration = Duration::from_secs(15);

/// Sentinel value shipped in the default settings file.
pub const APP_ID_PLACEHOLDER: &str = "YOUR_APP_ID_HERE";

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("settings error: {0}")]
    Settings(String),

    #[error("packet too short: got {got} bytes, need {need}")]
    Truncated { got: usize, need: usize },

    #[error("unknown track id {0}")]
    UnknownTrackId(i8),

    #[error("unknown session type id {0}")]
    UnknownSessionTypeId(u8),
}

pub type BridgeResult<T = ()> = Result<T, BridgeError>;
