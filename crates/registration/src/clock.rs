use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use coursedrill_core::config::PracticeConfig;
use coursedrill_core::{OffsetOption, PracticeApi, SessionEnded, SessionStarted, SimError, StartSessionRequest};

use crate::display::{ClockSurface, SurfaceLauncher};
use crate::random::BoxedRandom;

/// Lifecycle of the virtual clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockPhase {
    Idle,
    Starting,
    Running,
    Stopped,
    ForceTerminated,
}

impl ClockPhase {
    pub fn is_active(self) -> bool {
        matches!(self, ClockPhase::Starting | ClockPhase::Running)
    }
}

/// Why the end-of-practice callback fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Virtual time reached the cutoff.
    Cutoff,
    /// `stop(false)` from the owner.
    Forced,
}

pub type EndCallback = Arc<dyn Fn(EndReason) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualClockState {
    pub virtual_origin: NaiveDateTime,
    pub real_anchor: Instant,
    /// Nominal target instant of this run.
    pub target: NaiveDateTime,
    pub running: bool,
}

impl VirtualClockState {
    pub fn virtual_at(&self, real_now: Instant) -> NaiveDateTime {
        let elapsed = real_now.saturating_duration_since(self.real_anchor);
        let elapsed = chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        self.virtual_origin + elapsed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockStatus {
    pub phase: ClockPhase,
    pub state: Option<VirtualClockState>,
}

impl ClockStatus {
    fn idle() -> Self {
        Self { phase: ClockPhase::Idle, state: None }
    }
}

#[derive(Debug, Clone)]
pub struct ClockTiming {
    pub target_time: NaiveTime,
    pub cutoff_time: NaiveTime,
    pub tick_interval: Duration,
    pub max_desync_ms: u64,
}

impl ClockTiming {
    pub fn from_config(config: &PracticeConfig) -> Self {
        Self {
            target_time: config.target_time,
            cutoff_time: config.cutoff_time,
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
            max_desync_ms: config.max_desync_ms,
        }
    }
}

impl Default for ClockTiming {
    fn default() -> Self {
        Self::from_config(&PracticeConfig::default())
    }
}

/// Read-only view of the clock for the orchestrator and the display layer.
#[derive(Debug, Clone)]
pub struct ClockReader {
    rx: watch::Receiver<ClockStatus>,
}

impl ClockReader {
    pub fn new(rx: watch::Receiver<ClockStatus>) -> Self {
        Self { rx }
    }

    pub fn status(&self) -> ClockStatus {
        *self.rx.borrow()
    }

    pub fn phase(&self) -> ClockPhase {
        self.rx.borrow().phase
    }

    pub fn is_running(&self) -> bool {
        let status = self.rx.borrow();
        status.phase == ClockPhase::Running && status.state.map(|s| s.running).unwrap_or(false)
    }

    /// Virtual now and the run's target, while running.
    pub fn virtual_now(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let status = self.rx.borrow();
        if status.phase != ClockPhase::Running {
            return None;
        }
        status.state.map(|s| (s.virtual_at(Instant::now()), s.target))
    }

    pub fn watch(&self) -> watch::Receiver<ClockStatus> {
        self.rx.clone()
    }
}

#[derive(Default)]
struct RunResources {
    surface: Option<ClockSurface>,
    tick: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    Manual,
    Forced,
    Cutoff,
    SurfaceClosed,
    Teardown,
}

impl Termination {
    fn final_phase(self) -> ClockPhase {
        match self {
            Termination::Cutoff => ClockPhase::ForceTerminated,
            _ => ClockPhase::Stopped,
        }
    }

    fn callback_reason(self) -> Option<EndReason> {
        match self {
            Termination::Cutoff => Some(EndReason::Cutoff),
            Termination::Forced => Some(EndReason::Forced),
            Termination::Manual | Termination::SurfaceClosed | Termination::Teardown => None,
        }
    }

    /// Terminations raised by the tick task itself must not abort it.
    fn from_tick(self) -> bool {
        matches!(self, Termination::Cutoff | Termination::SurfaceClosed)
    }
}

struct ClockShared {
    api: Arc<dyn PracticeApi>,
    launcher: Arc<dyn SurfaceLauncher>,
    timing: ClockTiming,
    status: watch::Sender<ClockStatus>,
    resources: Mutex<RunResources>,
    on_end: Mutex<Option<EndCallback>>,
    rng: Mutex<BoxedRandom>,
    /// Bumped by every successful start claim.
    start_epoch: AtomicU64,
}

impl ClockShared {
    fn phase(&self) -> ClockPhase {
        self.status.borrow().phase
    }

    /// Still `Starting`, and still the start that claimed `epoch`.
    fn owns_start(&self, status: &ClockStatus, epoch: u64) -> bool {
        status.phase == ClockPhase::Starting && self.start_epoch.load(Ordering::SeqCst) == epoch
    }

    fn start_is_current(&self, epoch: u64) -> bool {
        self.owns_start(&self.status.borrow(), epoch)
    }

    fn reset_to_idle_if_starting(&self, epoch: u64) {
        self.status.send_if_modified(|s| {
            if self.owns_start(s, epoch) {
                *s = ClockStatus::idle();
                true
            } else {
                false
            }
        });
    }

    /// A stop overtook this start after the server opened a session; close it again.
    async fn abandon_start(&self) -> SimError {
        debug!("practice start cancelled, ending the session it opened");
        if let Err(e) = self.api.end_session().await {
            warn!(error = %e, "end session after cancelled start failed");
        }
        SimError::Cancelled
    }

    /// Tear down the active run. Returns `Ok(None)` if nothing was active.
    async fn finish(&self, how: Termination) -> Result<Option<SessionEnded>, SimError> {
        let final_phase = how.final_phase();
        let claimed = self.status.send_if_modified(|s| {
            if s.phase.is_active() {
                *s = ClockStatus { phase: final_phase, state: None };
                true
            } else {
                false
            }
        });
        if !claimed {
            debug!(?how, "clock already stopped");
            return Ok(None);
        }

        let (surface, tick) = {
            let mut resources = self.resources.lock().await;
            (resources.surface.take(), resources.tick.take())
        };
        if let Some(tick) = tick {
            if !how.from_tick() {
                tick.abort();
            }
        }
        if let Some(surface) = surface {
            surface.close();
        }

        info!(?how, phase = ?final_phase, "practice clock stopped");

        let ended = self.api.end_session().await;
        if let Err(e) = &ended {
            warn!(error = %e, "end session call failed");
        }

        if let Some(reason) = how.callback_reason() {
            let callback = self.on_end.lock().await.clone();
            if let Some(callback) = callback {
                callback(reason);
            }
        }

        ended.map(Some)
    }
}

/// Simulated clock for one practice run at a time.
pub struct VirtualClock {
    shared: Arc<ClockShared>,
}

impl VirtualClock {
    pub fn new(
        api: Arc<dyn PracticeApi>,
        launcher: Arc<dyn SurfaceLauncher>,
        timing: ClockTiming,
        rng: BoxedRandom,
    ) -> Self {
        let (status, _) = watch::channel(ClockStatus::idle());
        Self {
            shared: Arc::new(ClockShared {
                api,
                launcher,
                timing,
                status,
                resources: Mutex::new(RunResources::default()),
                on_end: Mutex::new(None),
                rng: Mutex::new(rng),
                start_epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn reader(&self) -> ClockReader {
        ClockReader::new(self.shared.status.subscribe())
    }

    pub fn phase(&self) -> ClockPhase {
        self.shared.phase()
    }

    /// Registers the end-of-practice callback, replacing any previous one.
    pub async fn set_end_callback(&self, callback: EndCallback) {
        *self.shared.on_end.lock().await = Some(callback);
    }

    /// Begin a run `offset_seconds` before the target instant.
    pub async fn start(&self, offset_seconds: u32) -> Result<SessionStarted, SimError> {
        let shared = &self.shared;
        let mut epoch = 0;
        let claimed = shared.status.send_if_modified(|s| {
            if s.phase.is_active() {
                false
            } else {
                epoch = shared.start_epoch.fetch_add(1, Ordering::SeqCst) + 1;
                *s = ClockStatus { phase: ClockPhase::Starting, state: None };
                true
            }
        });
        if !claimed {
            return Err(SimError::InvalidState("practice is already running".into()));
        }

        let option = OffsetOption::resolve(offset_seconds);
        let target = chrono::Local::now().date_naive().and_time(shared.timing.target_time);
        let virtual_origin = target - chrono::Duration::seconds(option.seconds() as i64);
        let delay_ms = {
            let mut rng = shared.rng.lock().await;
            rng.next_in_range(0, shared.timing.max_desync_ms as i64) as u64
        };

        let request = StartSessionRequest { option, delay: delay_ms };
        let started = match self.open_remote_session(&request).await {
            Ok(started) => started,
            Err(e) => {
                warn!(error = %e, "practice start failed");
                shared.reset_to_idle_if_starting(epoch);
                return Err(e);
            }
        };

        if !shared.start_is_current(epoch) {
            return Err(shared.abandon_start().await);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        if !shared.start_is_current(epoch) {
            debug!("practice start cancelled during desync delay");
            return Err(shared.abandon_start().await);
        }

        let real_anchor = Instant::now();
        let surface = match shared.launcher.open() {
            Ok(surface) => surface,
            Err(e) => {
                warn!(error = %e, "clock surface could not be opened");
                shared.reset_to_idle_if_starting(epoch);
                if let Err(end_err) = shared.api.end_session().await {
                    warn!(error = %end_err, "end session after surface failure failed");
                }
                return Err(e);
            }
        };
        // Nobody reads the first instant if the window is already gone; the tick notices.
        let _ = surface.publish(virtual_origin);

        let state = VirtualClockState {
            virtual_origin,
            real_anchor,
            target,
            running: true,
        };

        let mut resources = shared.resources.lock().await;
        let promoted = shared.status.send_if_modified(|s| {
            if shared.owns_start(s, epoch) {
                *s = ClockStatus { phase: ClockPhase::Running, state: Some(state) };
                true
            } else {
                false
            }
        });
        if !promoted {
            drop(resources);
            surface.close();
            return Err(shared.abandon_start().await);
        }
        resources.surface = Some(surface);
        resources.tick = Some(tokio::spawn(tick_loop(Arc::clone(shared))));
        drop(resources);

        info!(
            offset = %option,
            delay_ms,
            origin = %virtual_origin.time(),
            backend = shared.api.name(),
            "practice clock running"
        );
        Ok(started)
    }

    /// One conflict retry, nothing else.
    async fn open_remote_session(&self, request: &StartSessionRequest) -> Result<SessionStarted, SimError> {
        let api = &self.shared.api;
        match api.start_session(request).await {
            Ok(started) => Ok(started),
            Err(SimError::SessionConflict(reason)) => {
                warn!(%reason, "practice session already active, ending it and retrying once");
                if let Err(e) = api.end_session().await {
                    warn!(error = %e, "end session before retry failed");
                }
                api.start_session(request)
                    .await
                    .map_err(|e| SimError::StartRetryExhausted(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Stop the run. Safe to call any number of times.
    ///
    /// `manual = true` means the caller initiated the stop, so the
    /// end-of-practice callback is not invoked. Local cleanup always
    /// happens; a failed end-session call is returned afterwards.
    pub async fn stop(&self, manual: bool) -> Result<Option<SessionEnded>, SimError> {
        let how = if manual { Termination::Manual } else { Termination::Forced };
        self.shared.finish(how).await
    }
}

impl Drop for VirtualClock {
    fn drop(&mut self) {
        if !self.shared.phase().is_active() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let shared = Arc::clone(&self.shared);
                handle.spawn(async move {
                    let _ = shared.finish(Termination::Teardown).await;
                });
            }
            Err(_) => warn!("practice clock dropped outside a runtime, remote session left open"),
        }
    }
}

async fn tick_loop(shared: Arc<ClockShared>) {
    let mut ticker = tokio::time::interval(shared.timing.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // first tick completes immediately; start() already published the origin
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(state) = shared.status.borrow().state else {
            return;
        };
        let now = state.virtual_at(Instant::now());
        let cutoff = state.target.date().and_time(shared.timing.cutoff_time);

        let published = {
            let resources = shared.resources.lock().await;
            match resources.surface.as_ref() {
                Some(surface) => surface.publish(now).is_ok(),
                None => return,
            }
        };

        if !published {
            info!("clock surface closed externally");
            let _ = shared.finish(Termination::SurfaceClosed).await;
            return;
        }

        if now >= cutoff {
            info!(virtual_now = %now.time(), "practice cutoff reached");
            let _ = shared.finish(Termination::Cutoff).await;
            return;
        }
    }
}
