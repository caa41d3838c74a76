// F1 Presence Bridge - F1 23 telemetry to Discord Rich Presence
//
// Listens for the game's UDP telemetry, aggregates it into one race state,
// mirrors it to Discord Rich Presence, and posts a webhook notification when
// a race is won, lost or abandoned.

use std::time::Duration;

use clap::{Parser, Subcommand};
use f1_presence_bridge::common::{
    lookup,
    notify::{self, ResultNotifier, WebhookNotifier},
    presence::{self, DiscordPresence, PresencePublisher},
    router::{Router, RouterMessage},
    settings::AppSettings,
    state::SessionState,
    telemetry::{self, CarLapData, LapUpdate, ParticipantEntry, ParticipantsUpdate, SessionUpdate},
    util::BridgeResult,
};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

// Telemetry settings in-game:
//   Settings > Telemetry Settings > UDP Telemetry: On, Port: 20777, Format: 2023

#[derive(Parser)]
#[command(name = "f1-presence-bridge")]
#[command(about = "F1 23 telemetry to Discord Rich Presence bridge")]
struct Cli {
    /// UDP port to listen on (overrides the saved setting)
    #[arg(short, long)]
    port: Option<u16>,

    /// Discord webhook URL for race notifications (overrides the saved setting)
    #[arg(short, long)]
    webhook_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a sample presence without the game running
    Test {
        /// Also send a sample race notification to the configured webhook
        #[arg(short, long)]
        notify: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(err) = lookup::validate_tables() {
        error!(%err, "lookup tables do not cover the game's enumerations");
        return;
    }

    let mut settings = AppSettings::load();
    if let Some(url) = cli.webhook_url {
        settings.webhook_url = url;
    }
    if let Err(err) = settings.validate() {
        error!(%err, "set your Discord application id in the settings file");
        if let Ok(path) = AppSettings::config_path() {
            error!(path = %path.display(), "settings file location");
        }
        return;
    }

    let port = settings.effective_port(cli.port);

    match cli.command {
        Some(Commands::Test { notify }) => run_test(&settings, notify).await,
        None => run_bridge(&settings, port).await,
    }
}

async fn run_bridge(settings: &AppSettings, port: u16) {
    let publisher = DiscordPresence::spawn(&settings.app_id);

    let notifier: Option<Box<dyn ResultNotifier>> = match settings.webhook() {
        Some(url) => {
            info!("race notifications enabled");
            Some(Box::new(WebhookNotifier::new(url)))
        }
        None => {
            info!("no webhook configured, race notifications disabled");
            None
        }
    };

    let (tx, rx) = mpsc::channel::<RouterMessage>(256);
    let router = Router::new(Box::new(publisher), notifier, tx.clone());
    let router_task = tokio::spawn(router.run(rx));

    loop {
        match listen(port, &tx).await {
            Ok(()) => break,
            Err(err) => {
                error!(%err, port, "telemetry listener failed");
                info!("this usually means the port is in use, the game is not sending telemetry, or a firewall is in the way");
                info!("retrying in 5 seconds...");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }

    drop(tx);
    if let Err(err) = router_task.await {
        error!(%err, "router task failed");
    }
}

/// Receive datagrams and forward every decoded event to the router. Returns
/// `Ok` only when the router is gone.
async fn listen(port: u16, tx: &mpsc::Sender<RouterMessage>) -> BridgeResult {
    let socket = UdpSocket::bind(("127.0.0.1", port)).await?;
    info!(port, "listening for F1 23 telemetry");

    let mut buf = vec![0u8; 2048];
    loop {
        let (len, _) = socket.recv_from(&mut buf).await?;
        match telemetry::decode_event(&buf[..len]) {
            Ok(Some(event)) => {
                if tx.send(RouterMessage::Telemetry(event)).await.is_err() {
                    return Ok(());
                }
            }
            Ok(None) => {}
            Err(err) => debug!(%err, len, "dropping undecodable packet"),
        }
    }
}

/// Exercise the presence (and optionally the webhook) with a fabricated race
/// so both can be verified without the game.
async fn run_test(settings: &AppSettings, send_notification: bool) {
    let mut state = SessionState::new();

    let mut participants = vec![ParticipantEntry::default(); telemetry::MAX_CARS];
    participants[0] = ParticipantEntry {
        team_id: 1,
        platform_id: 1,
        name: "TEST DRIVER".to_string(),
    };
    state.apply_participants(&ParticipantsUpdate {
        player_car_index: 0,
        num_active_cars: 20,
        participants,
    });

    if let Err(err) = state.apply_session(&SessionUpdate {
        weather_id: 1,
        total_laps: 44,
        session_type_id: 10,
        track_id: 10,
        network_game: false,
        safety_car_periods: 1,
        virtual_safety_car_periods: 0,
        red_flag_periods: 0,
    }) {
        error!(%err, "failed to build the sample session");
        return;
    }

    let mut cars = vec![CarLapData::default(); telemetry::MAX_CARS];
    cars[0] = CarLapData {
        car_position: 3,
        current_lap_num: 23,
        num_pit_stops: 1,
        total_warnings: 0,
    };
    state.apply_lap(&LapUpdate {
        player_car_index: 0,
        cars,
    });

    let publisher = DiscordPresence::spawn(&settings.app_id);
    match presence::for_session(&state) {
        Some(payload) => {
            info!(details = %payload.details, "publishing sample presence for 10 seconds");
            publisher.publish(payload);
        }
        None => warn!("sample state produced no presence"),
    }

    if send_notification {
        match settings.webhook() {
            Some(url) => {
                state.final_position = 3;
                state.final_grid_position = 7;
                state.final_points = 15;
                state.final_result_status = 3;
                info!("sending sample race notification");
                WebhookNotifier::new(url)
                    .notify(notify::race_notification(&state, chrono::Utc::now()));
            }
            None => warn!("no webhook configured, skipping the sample notification"),
        }
    }

    tokio::time::sleep(Duration::from_secs(10)).await;
}
