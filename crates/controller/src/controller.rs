//! Controller actor: owns the session state and processes inputs sequentially.
//!
//! Operator commands, gateway completions and countdown ticks all arrive on
//! one mpsc channel and are fed through [`transition`] in order, so no two
//! inputs ever race on the Session. Callers talk to the actor through a
//! cheap-to-clone [`ControllerHandle`]; reads go through `ArcSwap` and never
//! wait on the actor.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use sprinklr_gateway::SessionGateway;
use sprinklr_protocol::ZoneId;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, Notify};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::controller_command::ControllerCommand;
use crate::countdown::{Ticker, DEFAULT_TICK};
use crate::input::{RunMinutes, ZoneSelection};
use crate::session::Session;
use crate::transition::{
    check_command, transition, CommandRejected, Effect, Input, SessionEvent, TransitionState,
};
use crate::zones::ZoneDirectory;

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    /// Countdown re-evaluation period
    pub tick: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self { tick: DEFAULT_TICK }
    }
}

/// Read-only view published after every input.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub session: Session,
    pub zones: Option<ZoneDirectory>,
    /// A start, stop or status call is outstanding
    pub busy: bool,
    pub zones_loading: bool,
}

impl Snapshot {
    fn of(state: &TransitionState) -> Self {
        Self {
            session: state.session.clone(),
            zones: state.zones.clone(),
            busy: state.is_busy(),
            zones_loading: state.zones_loading,
        }
    }

    /// Nothing outstanding against the controller.
    pub fn is_settled(&self) -> bool {
        !self.busy && !self.zones_loading
    }

    pub fn zone_label(&self, zone: ZoneId) -> String {
        match &self.zones {
            Some(zones) => zones.label(zone),
            None => format!("Zone {zone}"),
        }
    }
}

/// Handle to a running controller actor (cheap to Clone).
#[derive(Clone)]
pub struct ControllerHandle {
    command_tx: mpsc::Sender<ControllerCommand>,
    snapshot: Arc<ArcSwap<Snapshot>>,
    changed: Arc<Notify>,
    events: broadcast::Sender<SessionEvent>,
}

impl ControllerHandle {
    /// Spawn the actor and kick off the initial status and zone load.
    pub fn spawn<G, C>(gateway: G, clock: C, options: ControllerOptions) -> Self
    where
        G: SessionGateway,
        C: Clock,
    {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        // The first published snapshot already has the load outstanding, so
        // waiters never observe the pre-load state as settled.
        let (state, initial) =
            transition(TransitionState::new(), Input::Refresh, clock.now_millis());
        let snapshot = Arc::new(ArcSwap::from_pointee(Snapshot::of(&state)));
        let changed = Arc::new(Notify::new());

        let actor = ControllerActor {
            gateway: Arc::new(gateway),
            clock,
            state,
            ticker: Ticker::new(options.tick),
            inbox: command_tx.downgrade(),
            snapshot: snapshot.clone(),
            changed: changed.clone(),
            events: events.clone(),
        };
        tokio::spawn(actor.run(command_rx, initial));

        ControllerHandle {
            command_tx,
            snapshot,
            changed,
            events,
        }
    }

    /// Validate operator input locally, then ask the actor to start.
    ///
    /// Invalid input is rejected here and never reaches the controller.
    pub async fn start(
        &self,
        selection: ZoneSelection,
        minutes: &str,
    ) -> Result<(), CommandRejected> {
        let zone = selection.zone().ok_or(CommandRejected::NoZoneSelected)?;
        let minutes: RunMinutes = minutes.parse()?;
        self.start_run(zone, minutes).await
    }

    pub async fn start_run(&self, zone: ZoneId, minutes: RunMinutes) -> Result<(), CommandRejected> {
        self.operator(Input::Start { zone, minutes }).await
    }

    pub async fn stop(&self) -> Result<(), CommandRejected> {
        self.operator(Input::Stop).await
    }

    /// Re-query the controller status (the "Reset" action).
    pub async fn refresh(&self) -> Result<(), CommandRejected> {
        self.operator(Input::Refresh).await
    }

    /// Lock-free snapshot read.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Resolve once a published snapshot satisfies `pred`.
    pub async fn wait_for<P>(&self, pred: P) -> Result<Arc<Snapshot>, CommandRejected>
    where
        P: Fn(&Snapshot) -> bool,
    {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let snapshot = self.snapshot();
            if pred(&snapshot) {
                return Ok(snapshot);
            }
            if self.command_tx.is_closed() {
                return Err(CommandRejected::Closed);
            }
            notified.await;
        }
    }

    async fn operator(&self, input: Input) -> Result<(), CommandRejected> {
        let (reply, reply_rx) = oneshot::channel();
        if self
            .command_tx
            .send(ControllerCommand::Operator { input, reply })
            .await
            .is_err()
        {
            warn!(
                component = "controller",
                "Controller channel closed, command dropped"
            );
            return Err(CommandRejected::Closed);
        }
        reply_rx.await.unwrap_or(Err(CommandRejected::Closed))
    }
}

struct ControllerActor<G, C> {
    gateway: Arc<G>,
    clock: C,
    state: TransitionState,
    ticker: Ticker,
    inbox: mpsc::WeakSender<ControllerCommand>,
    snapshot: Arc<ArcSwap<Snapshot>>,
    changed: Arc<Notify>,
    events: broadcast::Sender<SessionEvent>,
}

impl<G, C> ControllerActor<G, C>
where
    G: SessionGateway,
    C: Clock,
{
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<ControllerCommand>,
        initial: Vec<Effect>,
    ) {
        info!(component = "controller", event = "controller.started");
        for effect in initial {
            self.execute(effect);
        }

        while let Some(cmd) = command_rx.recv().await {
            match cmd {
                ControllerCommand::Operator { input, reply } => {
                    if let Err(rejected) = check_command(&self.state, &input) {
                        debug!(
                            component = "controller",
                            event = "command.rejected",
                            reason = %rejected,
                        );
                        let _ = reply.send(Err(rejected));
                        continue;
                    }
                    self.apply(input);
                    let _ = reply.send(Ok(()));
                }
                ControllerCommand::Apply { input } => self.apply(input),
            }
        }

        drop(command_rx);
        self.ticker.disarm();
        self.changed.notify_waiters();
        info!(component = "controller", event = "controller.stopped");
    }

    fn apply(&mut self, input: Input) {
        let now = self.clock.now_millis();
        let (next, effects) = transition(std::mem::take(&mut self.state), input, now);
        self.state = next;

        // Publish before emitting so subscribers reading the snapshot on an
        // event never see the previous state.
        self.snapshot.store(Arc::new(Snapshot::of(&self.state)));
        self.changed.notify_waiters();

        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::QueryStatus => {
                self.call(|gw| async move { Input::StatusLoaded(gw.query_status().await) })
            }
            Effect::LoadZones => {
                self.call(|gw| async move { Input::ZonesLoaded(gw.list_zones().await) })
            }
            Effect::CallStart { zone, minutes } => self.call(move |gw| async move {
                Input::StartCompleted(gw.start(zone, minutes).await)
            }),
            Effect::CallStop => {
                self.call(|gw| async move { Input::StopCompleted(gw.stop().await) })
            }
            Effect::ArmCountdown { end_timestamp } => {
                debug!(
                    component = "controller",
                    event = "countdown.armed",
                    end_timestamp,
                );
                let inbox = self.inbox.clone();
                self.ticker.arm(move || {
                    let Some(tx) = inbox.upgrade() else {
                        return false;
                    };
                    match tx.try_send(ControllerCommand::Apply { input: Input::Tick }) {
                        Ok(()) | Err(TrySendError::Full(_)) => true,
                        Err(TrySendError::Closed(_)) => false,
                    }
                });
            }
            Effect::DisarmCountdown => {
                debug!(component = "controller", event = "countdown.disarmed");
                self.ticker.disarm();
            }
            Effect::Emit(event) => {
                // No receivers is fine.
                let _ = self.events.send(event);
            }
        }
    }

    /// Run one gateway operation off the actor and feed its result back in.
    ///
    /// The task only holds a weak sender while the call is pending, so
    /// dropping every handle stops the actor and the result is discarded.
    fn call<F, Fut>(&self, op: F)
    where
        F: FnOnce(Arc<G>) -> Fut,
        Fut: Future<Output = Input> + Send + 'static,
    {
        let inbox = self.inbox.clone();
        let pending = op(self.gateway.clone());
        tokio::spawn(async move {
            let input = pending.await;
            let Some(tx) = inbox.upgrade() else {
                debug!(
                    component = "controller",
                    "Controller gone before gateway result arrived, dropped"
                );
                return;
            };
            if tx.send(ControllerCommand::Apply { input }).await.is_err() {
                debug!(
                    component = "controller",
                    "Controller gone before gateway result arrived, dropped"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use sprinklr_gateway::{GatewayError, StartAck, StopAck};
    use sprinklr_protocol::{RemoteStatus, SystemState, Zone};

    use crate::clock::ManualClock;
    use crate::input::DurationError;
    use crate::session::SessionStatus;
    use tokio::sync::broadcast::error::RecvError;

    const NOW: i64 = 1_700_000_000_000;

    #[derive(Default)]
    struct Script {
        status: Mutex<VecDeque<Result<RemoteStatus, GatewayError>>>,
        start: Mutex<VecDeque<Result<StartAck, GatewayError>>>,
        stop: Mutex<VecDeque<Result<StopAck, GatewayError>>>,
        zones: Mutex<VecDeque<Result<Vec<Zone>, GatewayError>>>,
        delay: Duration,
        zones_delay: Duration,
        status_calls: AtomicUsize,
        start_calls: AtomicUsize,
        stop_calls: AtomicUsize,
    }

    #[derive(Clone, Default)]
    struct FakeGateway(Arc<Script>);

    impl FakeGateway {
        fn with_delay(delay: Duration) -> Self {
            Self(Arc::new(Script {
                delay,
                ..Script::default()
            }))
        }

        fn push_status(&self, result: Result<RemoteStatus, GatewayError>) {
            self.0.status.lock().unwrap().push_back(result);
        }

        fn push_zones(&self, result: Result<Vec<Zone>, GatewayError>) {
            self.0.zones.lock().unwrap().push_back(result);
        }

        fn push_start(&self, result: Result<StartAck, GatewayError>) {
            self.0.start.lock().unwrap().push_back(result);
        }

        async fn pause(&self) {
            if !self.0.delay.is_zero() {
                tokio::time::sleep(self.0.delay).await;
            }
        }
    }

    impl SessionGateway for FakeGateway {
        async fn query_status(&self) -> Result<RemoteStatus, GatewayError> {
            self.0.status_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;
            let next = self.0.status.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(remote(SystemState::Inactive, None, None)))
        }

        async fn list_zones(&self) -> Result<Vec<Zone>, GatewayError> {
            self.pause().await;
            if !self.0.zones_delay.is_zero() {
                tokio::time::sleep(self.0.zones_delay).await;
            }
            if let Some(scripted) = self.0.zones.lock().unwrap().pop_front() {
                return scripted;
            }
            Ok(vec![
                Zone {
                    id: zone(1),
                    name: "Front Lawn".to_string(),
                },
                Zone {
                    id: zone(2),
                    name: "Back Lawn".to_string(),
                },
            ])
        }

        async fn start(&self, _zone: ZoneId, _minutes: u32) -> Result<StartAck, GatewayError> {
            self.0.start_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;
            let next = self.0.start.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(GatewayError::server("unscripted start")))
        }

        async fn stop(&self) -> Result<StopAck, GatewayError> {
            self.0.stop_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;
            let next = self.0.stop.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(StopAck::default()))
        }
    }

    fn zone(id: u32) -> ZoneId {
        ZoneId::new(id).unwrap()
    }

    fn remote(state: SystemState, zone: Option<u32>, secs: Option<u64>) -> RemoteStatus {
        RemoteStatus {
            state,
            message: None,
            zone: zone.and_then(ZoneId::new),
            duration_secs: secs,
        }
    }

    fn ack(zone_id: u32, secs: u64) -> StartAck {
        StartAck {
            zone: zone(zone_id),
            duration_secs: secs,
            message: None,
        }
    }

    fn spawn(gateway: &FakeGateway, clock: &ManualClock) -> ControllerHandle {
        ControllerHandle::spawn(
            gateway.clone(),
            clock.clone(),
            ControllerOptions {
                tick: Duration::from_millis(10),
            },
        )
    }

    async fn settle(handle: &ControllerHandle) -> Arc<Snapshot> {
        tokio::time::timeout(Duration::from_secs(2), handle.wait_for(Snapshot::is_settled))
            .await
            .expect("controller did not settle")
            .expect("controller closed")
    }

    #[tokio::test]
    async fn initial_load_adopts_remote_active_run() {
        let gateway = FakeGateway::default();
        gateway.push_status(Ok(remote(SystemState::Active, Some(2), Some(90))));
        let clock = ManualClock::new(NOW);
        let handle = spawn(&gateway, &clock);

        let snap = settle(&handle).await;
        assert_eq!(snap.session.status, SessionStatus::Active);
        assert_eq!(snap.session.zone, Some(zone(2)));
        assert_eq!(snap.session.end_timestamp, Some(NOW + 90_000));
        assert_eq!(snap.zone_label(zone(2)), "Back Lawn");
        assert_eq!(snap.zones.as_ref().map(ZoneDirectory::len), Some(2));
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_gateway() {
        let gateway = FakeGateway::default();
        let clock = ManualClock::new(NOW);
        let handle = spawn(&gateway, &clock);
        settle(&handle).await;

        for minutes in ["0", "61", "-5", "5.5", "abc"] {
            assert_eq!(
                handle.start(ZoneSelection::from_raw(1), minutes).await,
                Err(CommandRejected::InvalidDuration(DurationError))
            );
        }
        assert_eq!(
            handle.start(ZoneSelection::none(), "5").await,
            Err(CommandRejected::NoZoneSelected)
        );
        assert_eq!(gateway.0.start_calls.load(Ordering::SeqCst), 0);
        assert_eq!(handle.snapshot().session.status, SessionStatus::Idle);
    }

    #[tokio::test]
    async fn start_becomes_active_with_local_end_time() {
        let gateway = FakeGateway::default();
        gateway.push_start(Ok(ack(1, 300)));
        let clock = ManualClock::new(NOW);
        let handle = spawn(&gateway, &clock);
        settle(&handle).await;

        handle
            .start(ZoneSelection::from_raw(1), "5")
            .await
            .expect("start accepted");
        let snap = settle(&handle).await;

        assert_eq!(snap.session.status, SessionStatus::Active);
        assert_eq!(snap.session.zone, Some(zone(1)));
        assert_eq!(snap.session.end_timestamp, Some(NOW + 300_000));
        assert_eq!(gateway.0.start_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn conflicting_ack_adopts_running_zone() {
        let gateway = FakeGateway::default();
        gateway.push_start(Ok(ack(2, 45)));
        let clock = ManualClock::new(NOW);
        let handle = spawn(&gateway, &clock);
        settle(&handle).await;

        handle
            .start(ZoneSelection::from_raw(1), "5")
            .await
            .expect("start accepted");
        let snap = settle(&handle).await;

        assert_eq!(snap.session.status, SessionStatus::Active);
        assert_eq!(snap.session.zone, Some(zone(2)));
        assert_eq!(snap.session.end_timestamp, Some(NOW + 45_000));
        assert_eq!(
            snap.session.message,
            "Error, system already active on zone 2"
        );
    }

    #[tokio::test]
    async fn expiry_issues_exactly_one_stop() {
        let gateway = FakeGateway::default();
        gateway.push_start(Ok(ack(1, 60)));
        let clock = ManualClock::new(NOW);
        let handle = spawn(&gateway, &clock);
        settle(&handle).await;
        let mut events = handle.subscribe();

        handle
            .start(ZoneSelection::from_raw(1), "1")
            .await
            .expect("start accepted");
        settle(&handle).await;

        // Ticks before the end only report the countdown.
        let countdown = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(SessionEvent::Countdown { remaining, .. }) = events.recv().await {
                    return remaining;
                }
            }
        })
        .await
        .expect("countdown event");
        assert_eq!((countdown.minutes, countdown.seconds), (1, 0));
        assert_eq!(gateway.0.stop_calls.load(Ordering::SeqCst), 0);

        clock.advance(60_000);
        let snap = tokio::time::timeout(
            Duration::from_secs(2),
            handle.wait_for(|s| s.session.status == SessionStatus::Idle && s.is_settled()),
        )
        .await
        .expect("expired")
        .expect("controller closed");
        assert!(snap.session.zone.is_none());

        // Further ticks would have fired by now if the countdown were still armed.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(gateway.0.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.snapshot().session.status, SessionStatus::Idle);
    }

    #[tokio::test]
    async fn start_stop_refresh_round_trip() {
        let gateway = FakeGateway::default();
        gateway.push_start(Ok(ack(1, 600)));
        let clock = ManualClock::new(NOW);
        let handle = spawn(&gateway, &clock);
        settle(&handle).await;

        handle
            .start(ZoneSelection::from_raw(1), "10")
            .await
            .expect("start accepted");
        assert_eq!(settle(&handle).await.session.status, SessionStatus::Active);

        handle.stop().await.expect("stop accepted");
        let snap = settle(&handle).await;
        assert_eq!(snap.session.status, SessionStatus::Idle);
        assert!(snap.session.zone.is_none());

        handle.refresh().await.expect("refresh accepted");
        let snap = settle(&handle).await;
        assert_eq!(snap.session.status, SessionStatus::Idle);
        assert!(snap.session.zone.is_none());
        assert!(snap.session.end_timestamp.is_none());
        assert_eq!(gateway.0.status_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn load_timeout_surfaces_error() {
        let gateway = FakeGateway::default();
        gateway.push_status(Err(GatewayError::timeout(Duration::from_secs(8))));
        let clock = ManualClock::new(NOW);
        let handle = spawn(&gateway, &clock);

        let snap = settle(&handle).await;
        assert_eq!(snap.session.status, SessionStatus::Error);
        assert!(snap.session.message.contains("timed out"));
        assert!(snap.session.zone.is_none());
        assert!(snap.session.end_timestamp.is_none());
    }

    #[tokio::test]
    async fn second_command_while_outstanding_is_rejected() {
        let gateway = FakeGateway::with_delay(Duration::from_millis(100));
        gateway.push_start(Ok(ack(1, 300)));
        let clock = ManualClock::new(NOW);
        let handle = spawn(&gateway, &clock);
        settle(&handle).await;

        handle
            .start(ZoneSelection::from_raw(1), "5")
            .await
            .expect("start accepted");
        assert_eq!(handle.stop().await, Err(CommandRejected::Busy));
        assert_eq!(
            handle.start(ZoneSelection::from_raw(2), "5").await,
            Err(CommandRejected::Busy)
        );
        assert_eq!(handle.refresh().await, Err(CommandRejected::Busy));

        let snap = settle(&handle).await;
        assert_eq!(snap.session.status, SessionStatus::Active);
        assert_eq!(gateway.0.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.0.stop_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_when_idle_is_rejected() {
        let gateway = FakeGateway::default();
        let clock = ManualClock::new(NOW);
        let handle = spawn(&gateway, &clock);
        settle(&handle).await;

        assert_eq!(handle.stop().await, Err(CommandRejected::NotRunning));
        assert_eq!(gateway.0.stop_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zone_list_failure_is_error_until_refresh() {
        let gateway = FakeGateway(Arc::new(Script {
            zones_delay: Duration::from_millis(50),
            ..Script::default()
        }));
        gateway.push_zones(Err(GatewayError::server(
            "Failed to load sprinklers data, see logs for details",
        )));
        let clock = ManualClock::new(NOW);
        let handle = spawn(&gateway, &clock);

        let snap = settle(&handle).await;
        assert_eq!(snap.session.status, SessionStatus::Error);
        assert_eq!(
            snap.session.message,
            "Failed to load sprinklers data, see logs for details"
        );
        assert!(snap.zones.is_none());

        // The reset action queries again and retries the zone list.
        handle.refresh().await.expect("refresh accepted");
        let snap = settle(&handle).await;
        assert_eq!(snap.session.status, SessionStatus::Idle);
        assert_eq!(snap.zones.as_ref().map(ZoneDirectory::len), Some(2));
    }

    #[tokio::test]
    async fn dropping_every_handle_discards_pending_results() {
        let gateway = FakeGateway::with_delay(Duration::from_millis(200));
        gateway.push_status(Ok(remote(SystemState::Active, Some(1), Some(90))));
        let clock = ManualClock::new(NOW);
        let handle = spawn(&gateway, &clock);
        let mut events = handle.subscribe();
        drop(handle);

        let mut seen = Vec::new();
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match events.recv().await {
                    Ok(event) => seen.push(event),
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        })
        .await
        .expect("controller did not stop");

        // Let the abandoned query resolve; nothing may be applied.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(seen.is_empty(), "abandoned result applied: {seen:?}");
        assert_eq!(gateway.0.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_snapshot_is_never_settled_before_load() {
        let gateway = FakeGateway::with_delay(Duration::from_millis(50));
        let clock = ManualClock::new(NOW);
        let handle = spawn(&gateway, &clock);

        let first = handle.snapshot();
        assert_eq!(first.session.status, SessionStatus::Loading);
        assert!(!first.is_settled());

        let snap = settle(&handle).await;
        assert_eq!(snap.session.status, SessionStatus::Idle);
    }
}
