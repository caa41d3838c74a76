// Event router and completion workflow
//
// One task owns the SessionState; every event kind is serialized onto its
// channel and dispatched to exactly one handler in arrival order. The
// deferred idle reset re-enters through the same channel as a synthetic
// message, so nothing else ever touches the state. Handler errors drop the
// offending event and nothing more.

use std::time::Duration;

use tokio::sync::mpsc::{Receiver, Sender, WeakSender};
use tracing::{debug, error, info};

use crate::common::notify::{self, ResultNotifier};
use crate::common::presence::{self, PresencePublisher};
use crate::common::state::SessionState;
use crate::common::telemetry::{
    EventDetailsUpdate, FinalClassificationUpdate, LapUpdate, LobbyUpdate, ParticipantsUpdate,
    SessionUpdate, TelemetryEvent,
};
use crate::common::util::IDLE_RESET_DELAY;

/// Everything the router task consumes: decoded telemetry, plus the synthetic
/// reset the completion workflow posts back to itself.
#[derive(Debug)]
pub enum RouterMessage {
    Telemetry(TelemetryEvent),
    IdleReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Idle,
    InSession,
    ResultPending,
    ResetScheduled,
}

pub struct Router {
    state: SessionState,
    phase: WorkflowPhase,
    presence: Box<dyn PresencePublisher>,
    notifier: Option<Box<dyn ResultNotifier>>,
    // Weak, so the router's own reset posts never keep its channel alive.
    self_tx: WeakSender<RouterMessage>,
    reset_delay: Duration,
    started_at: i64,
}

impl Router {
    /// `self_tx` must be a sender for the same channel `run` will drain; the
    /// deferred idle reset is posted through it.
    pub fn new(
        presence: Box<dyn PresencePublisher>,
        notifier: Option<Box<dyn ResultNotifier>>,
        self_tx: Sender<RouterMessage>,
    ) -> Self {
        Self {
            state: SessionState::new(),
            phase: WorkflowPhase::Idle,
            presence,
            notifier,
            self_tx: self_tx.downgrade(),
            reset_delay: IDLE_RESET_DELAY,
            started_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    /// Drains the channel until every sender is gone.
    pub async fn run(mut self, mut rx: Receiver<RouterMessage>) {
        self.presence
            .publish(presence::idle(Some(self.started_at)));
        while let Some(message) = rx.recv().await {
            self.handle_message(message);
        }
        info!("telemetry channel closed, router stopping");
    }

    pub fn handle_message(&mut self, message: RouterMessage) {
        match message {
            RouterMessage::Telemetry(event) => self.handle_event(event),
            RouterMessage::IdleReset => self.on_idle_reset(),
        }
    }

    fn handle_event(&mut self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::Lap(lap) => self.on_lap(&lap),
            TelemetryEvent::Session(session) => self.on_session(&session),
            TelemetryEvent::Participants(participants) => self.on_participants(&participants),
            TelemetryEvent::Lobby(lobby) => self.on_lobby(&lobby),
            TelemetryEvent::FinalClassification(classification) => {
                self.on_final_classification(&classification)
            }
            TelemetryEvent::EventDetails(details) => self.on_event_details(&details),
        }
    }

    /// A lap or session event while no session is tracked marks the start of
    /// a new one and rearms the notification guard.
    fn begin_session(&mut self) {
        if matches!(self.phase, WorkflowPhase::Idle | WorkflowPhase::ResetScheduled) {
            info!("session started");
            self.phase = WorkflowPhase::InSession;
            self.state.notified_for_current_result = false;
        }
    }

    // Lap data only mutates state; presence follows the session cadence.
    fn on_lap(&mut self, lap: &LapUpdate) {
        self.begin_session();
        self.state.apply_lap(lap);
    }

    fn on_session(&mut self, session: &SessionUpdate) {
        self.begin_session();
        if let Err(err) = self.state.apply_session(session) {
            error!(%err, "dropping session update");
            return;
        }
        if let Some(payload) = presence::for_session(&self.state) {
            self.presence.publish(payload);
        }
    }

    fn on_participants(&mut self, participants: &ParticipantsUpdate) {
        self.state.apply_participants(participants);
    }

    fn on_lobby(&mut self, lobby: &LobbyUpdate) {
        self.state.apply_lobby(lobby);
        self.presence.publish(presence::lobby(&self.state));
    }

    fn on_event_details(&mut self, details: &EventDetailsUpdate) {
        match details {
            EventDetailsUpdate::FastestLap {
                vehicle_index,
                lap_time,
            } => debug!(vehicle_index, lap_time, "fastest lap"),
            EventDetailsUpdate::SpeedTrap {
                vehicle_index,
                speed,
            } => debug!(vehicle_index, speed, "speed trap"),
            EventDetailsUpdate::Other { code } => {
                debug!(code = %String::from_utf8_lossy(code), "session event")
            }
        }
    }

    fn on_final_classification(&mut self, classification: &FinalClassificationUpdate) {
        self.state.apply_final_classification(classification);
        self.phase = WorkflowPhase::ResultPending;

        if !self.state.is_race() {
            self.presence
                .publish(presence::session_completed(&self.state));
        } else if let Some(payload) = presence::race_result(&self.state) {
            let finished = self.state.final_result_status == 3;
            self.presence.publish(payload);
            if finished {
                self.maybe_notify();
            }
        } else {
            debug!(
                status = self.state.final_result_status,
                "race result status has no presence"
            );
        }

        self.schedule_idle_reset();
    }

    fn maybe_notify(&mut self) {
        if self.state.notified_for_current_result {
            return;
        }
        if let Some(notifier) = &self.notifier {
            info!(
                position = self.state.final_position,
                points = self.state.final_points,
                "sending race-result notification"
            );
            notifier.notify(notify::race_notification(&self.state, chrono::Utc::now()));
            self.state.notified_for_current_result = true;
        }
    }

    /// The game never reports "back in the menus"; assume the post-race
    /// screen is gone after the delay and republish idle. Never cancelled: a
    /// reset firing into a new session is an idempotent overwrite.
    fn schedule_idle_reset(&mut self) {
        self.phase = WorkflowPhase::ResetScheduled;
        let tx = self.self_tx.clone();
        let delay = self.reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(RouterMessage::IdleReset).await;
            }
        });
    }

    fn on_idle_reset(&mut self) {
        info!("returning presence to idle");
        self.phase = WorkflowPhase::Idle;
        self.state.notified_for_current_result = false;
        self.presence
            .publish(presence::idle(Some(self.started_at)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::sync::mpsc;

    use crate::common::notify::WebhookMessage;
    use crate::common::presence::PresencePayload;
    use crate::common::telemetry::{
        CarLapData, FinalClassificationEntry, ParticipantEntry,
    };

    #[derive(Clone, Default)]
    struct RecordingPublisher {
        payloads: Arc<Mutex<Vec<PresencePayload>>>,
    }

    impl PresencePublisher for RecordingPublisher {
        fn publish(&self, payload: PresencePayload) {
            self.payloads.lock().unwrap().push(payload);
        }
    }

    impl RecordingPublisher {
        fn last(&self) -> Option<PresencePayload> {
            self.payloads.lock().unwrap().last().cloned()
        }

        fn count(&self) -> usize {
            self.payloads.lock().unwrap().len()
        }
    }

    #[derive(Clone, Default)]
    struct CountingNotifier {
        sent: Arc<AtomicUsize>,
    }

    impl ResultNotifier for CountingNotifier {
        fn notify(&self, _message: WebhookMessage) {
            self.sent.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        router: Router,
        publisher: RecordingPublisher,
        notifier: CountingNotifier,
        // Held open so the router's weak self-sender stays upgradable.
        _tx: mpsc::Sender<RouterMessage>,
        rx: mpsc::Receiver<RouterMessage>,
    }

    fn fixture() -> Fixture {
        let publisher = RecordingPublisher::default();
        let notifier = CountingNotifier::default();
        let (tx, rx) = mpsc::channel(64);
        let router = Router::new(
            Box::new(publisher.clone()),
            Some(Box::new(notifier.clone())),
            tx.clone(),
        )
        .with_reset_delay(Duration::from_millis(20));
        Fixture {
            router,
            publisher,
            notifier,
            _tx: tx,
            rx,
        }
    }

    fn lap_event(lap: u8, position: u8) -> TelemetryEvent {
        let mut cars = vec![CarLapData::default(); 22];
        cars[0] = CarLapData {
            car_position: position,
            current_lap_num: lap,
            num_pit_stops: 0,
            total_warnings: 0,
        };
        TelemetryEvent::Lap(LapUpdate {
            player_car_index: 0,
            cars,
        })
    }

    fn session_event(session_type_id: u8, track_id: i8, total_laps: u8) -> TelemetryEvent {
        TelemetryEvent::Session(SessionUpdate {
            weather_id: 0,
            total_laps,
            session_type_id,
            track_id,
            network_game: false,
            safety_car_periods: 0,
            virtual_safety_car_periods: 0,
            red_flag_periods: 0,
        })
    }

    fn participants_event(team_id: u8) -> TelemetryEvent {
        let mut participants = vec![ParticipantEntry::default(); 22];
        participants[0] = ParticipantEntry {
            team_id,
            platform_id: 1,
            name: "PLAYER".to_string(),
        };
        TelemetryEvent::Participants(ParticipantsUpdate {
            player_car_index: 0,
            num_active_cars: 20,
            participants,
        })
    }

    fn classification_event(result_status: u8) -> TelemetryEvent {
        let mut cars = vec![FinalClassificationEntry::default(); 22];
        cars[0] = FinalClassificationEntry {
            position: 1,
            grid_position: 4,
            points: 25,
            result_status,
        };
        TelemetryEvent::FinalClassification(FinalClassificationUpdate {
            player_car_index: 0,
            num_cars: 20,
            cars,
        })
    }

    fn telemetry(event: TelemetryEvent) -> RouterMessage {
        RouterMessage::Telemetry(event)
    }

    #[tokio::test]
    async fn race_cadence_publishes_position_and_completion() {
        let mut fx = fixture();
        fx.router.handle_message(telemetry(participants_event(2)));
        fx.router.handle_message(telemetry(session_event(10, 5, 10)));
        fx.router.handle_message(telemetry(lap_event(1, 6)));
        fx.router.handle_message(telemetry(lap_event(2, 4)));
        fx.router.handle_message(telemetry(session_event(10, 5, 10)));

        assert_eq!(fx.router.state().race_completion_pct, 11.11);
        let last = fx.publisher.last().unwrap();
        assert_eq!(last.details, "Race - Monaco | Lap 2 / 10 | 11.11% complete");
        assert_eq!(
            last.state,
            "Racing for Oracle Red Bull Racing | P4 / P20 | Conditions: Clear"
        );
        assert_eq!(fx.router.phase(), WorkflowPhase::InSession);
    }

    #[tokio::test]
    async fn lap_events_do_not_publish() {
        let mut fx = fixture();
        fx.router.handle_message(telemetry(session_event(10, 5, 10)));
        let published = fx.publisher.count();
        fx.router.handle_message(telemetry(lap_event(2, 4)));
        assert_eq!(fx.publisher.count(), published);
    }

    #[tokio::test]
    async fn unknown_track_drops_the_event_and_publishes_nothing() {
        let mut fx = fixture();
        fx.router.handle_message(telemetry(session_event(10, 5, 10)));
        let published = fx.publisher.count();

        fx.router.handle_message(telemetry(session_event(10, 127, 50)));
        assert_eq!(fx.publisher.count(), published);
        assert_eq!(fx.router.state().track, "Monaco");
        assert_eq!(fx.router.state().total_laps, 10);
    }

    #[tokio::test]
    async fn unknown_session_type_range_publishes_nothing() {
        let mut fx = fixture();
        fx.router.handle_message(telemetry(session_event(0, 5, 10)));
        assert_eq!(fx.publisher.count(), 0);
        assert_eq!(fx.router.state().session_type, "Unknown");
    }

    #[tokio::test]
    async fn lobby_updates_publish_immediately() {
        let mut fx = fixture();
        fx.router
            .handle_message(telemetry(TelemetryEvent::Lobby(LobbyUpdate {
                num_players: 5,
            })));
        let last = fx.publisher.last().unwrap();
        assert_eq!(last.details, "In the menus");
        assert_eq!(last.state, "Waiting in the lobby with 4 other players");
    }

    #[tokio::test]
    async fn finished_race_notifies_once_and_schedules_the_reset() {
        let mut fx = fixture();
        fx.router.handle_message(telemetry(participants_event(2)));
        fx.router.handle_message(telemetry(session_event(10, 5, 10)));
        fx.router.handle_message(telemetry(classification_event(3)));

        assert_eq!(fx.notifier.sent.load(Ordering::SeqCst), 1);
        assert!(fx.router.state().notified_for_current_result);
        assert_eq!(fx.router.phase(), WorkflowPhase::ResetScheduled);
        assert!(fx
            .publisher
            .last()
            .unwrap()
            .details
            .starts_with("Finished: P1 / P20"));

        // The deferred reset arrives through the channel, not a side door.
        let reset = tokio::time::timeout(Duration::from_millis(200), fx.rx.recv())
            .await
            .expect("reset was not scheduled")
            .expect("channel closed");
        assert!(matches!(reset, RouterMessage::IdleReset));
        fx.router.handle_message(reset);
        assert_eq!(fx.router.phase(), WorkflowPhase::Idle);
        assert_eq!(fx.publisher.last().unwrap().details, "Idle");
    }

    #[tokio::test]
    async fn non_race_completion_skips_the_notification_but_still_resets() {
        let mut fx = fixture();
        fx.router.handle_message(telemetry(session_event(5, 5, 0)));
        fx.router.handle_message(telemetry(classification_event(3)));

        assert_eq!(fx.notifier.sent.load(Ordering::SeqCst), 0);
        assert_eq!(
            fx.publisher.last().unwrap().details,
            "Session Completed | Track: Monaco"
        );
        assert_eq!(fx.router.phase(), WorkflowPhase::ResetScheduled);

        let reset = tokio::time::timeout(Duration::from_millis(200), fx.rx.recv())
            .await
            .expect("reset was not scheduled")
            .expect("channel closed");
        assert!(matches!(reset, RouterMessage::IdleReset));
    }

    #[tokio::test]
    async fn dnf_publishes_status_without_notification() {
        let mut fx = fixture();
        fx.router.handle_message(telemetry(session_event(10, 5, 10)));
        fx.router.handle_message(telemetry(classification_event(4)));

        assert_eq!(fx.notifier.sent.load(Ordering::SeqCst), 0);
        assert!(fx.publisher.last().unwrap().details.starts_with("DNF"));
    }

    #[tokio::test]
    async fn repeated_classification_does_not_renotify_until_a_new_session() {
        let mut fx = fixture();
        fx.router.handle_message(telemetry(session_event(10, 5, 10)));
        fx.router.handle_message(telemetry(classification_event(3)));
        fx.router.handle_message(telemetry(classification_event(3)));
        assert_eq!(fx.notifier.sent.load(Ordering::SeqCst), 1);

        // Reset rearms the guard; the next completed race notifies again.
        fx.router.handle_message(RouterMessage::IdleReset);
        fx.router.handle_message(telemetry(session_event(10, 5, 10)));
        fx.router.handle_message(telemetry(classification_event(3)));
        assert_eq!(fx.notifier.sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn run_loop_applies_events_in_arrival_order() {
        let publisher = RecordingPublisher::default();
        let (tx, rx) = mpsc::channel(64);
        let router = Router::new(Box::new(publisher.clone()), None, tx.clone())
            .with_reset_delay(Duration::from_millis(10));
        let task = tokio::spawn(router.run(rx));

        for message in [
            telemetry(participants_event(2)),
            telemetry(session_event(10, 5, 10)),
            telemetry(lap_event(2, 4)),
            telemetry(session_event(10, 5, 10)),
            telemetry(classification_event(3)),
        ] {
            tx.send(message).await.unwrap();
        }

        // Let the deferred reset fire and flow back through the channel.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(publisher.last().unwrap().details, "Idle");

        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn startup_publishes_the_idle_presence() {
        let publisher = RecordingPublisher::default();
        let (tx, rx) = mpsc::channel(8);
        let router = Router::new(Box::new(publisher.clone()), None, tx.clone());
        let task = tokio::spawn(router.run(rx));

        tokio::time::sleep(Duration::from_millis(20)).await;
        let first = publisher.payloads.lock().unwrap().first().cloned().unwrap();
        assert_eq!(first.details, "Idle");
        assert!(first.start_timestamp.is_some());

        drop(tx);
        task.await.unwrap();
    }
}
