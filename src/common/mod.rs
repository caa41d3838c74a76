pub mod lookup;
pub mod notify;
pub mod presence;
pub mod router;
pub mod settings;
pub mod state;
pub mod telemetry;
pub mod util;
