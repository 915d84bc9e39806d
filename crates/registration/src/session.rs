use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tracing::{info, warn};

use coursedrill_core::config::PracticeConfig;
use coursedrill_core::{CartCourse, PracticeApi, SessionEnded, SessionStarted, SimError};

use crate::captcha::{CaptchaChallenge, CaptchaPad};
use crate::clock::{ClockReader, ClockTiming, EndCallback, VirtualClock};
use crate::core::*;
use crate::display::SurfaceLauncher;
use crate::orchestrator::{AttemptOrchestrator, AttemptReport};
use crate::queue::QueueState;
use crate::random::{BoxedRandom, SeededRandom};

/// One random stream per component so their draws never interleave.
pub struct RandomSources {
    pub clock: BoxedRandom,
    pub queue: BoxedRandom,
    pub captcha: BoxedRandom,
}

impl RandomSources {
    pub fn seeded(seed: Option<u64>) -> Self {
        let mut root = SeededRandom::from_option(seed);
        Self {
            clock: Box::new(root.fork()),
            queue: Box::new(root.fork()),
            captcha: Box::new(root.fork()),
        }
    }
}

/// Everything a front end needs to drive practice runs.
pub struct PracticeSession {
    api: Arc<dyn PracticeApi>,
    clock: VirtualClock,
    orchestrator: AttemptOrchestrator,
    captcha: Mutex<CaptchaPad>,
    cart: RwLock<Vec<CartCourse>>,
    records: Mutex<Vec<AttemptRecord>>,
    /// Serializes `start` so the active check and the reset see the same phase.
    start_lock: Mutex<()>,
}

impl PracticeSession {
    pub fn new(
        api: Arc<dyn PracticeApi>,
        launcher: Arc<dyn SurfaceLauncher>,
        config: &PracticeConfig,
    ) -> Self {
        Self::with_sources(
            api,
            launcher,
            ClockTiming::from_config(config),
            Duration::from_millis(config.queue_step_interval_ms),
            RandomSources::seeded(config.seed),
        )
    }

    pub fn with_sources(
        api: Arc<dyn PracticeApi>,
        launcher: Arc<dyn SurfaceLauncher>,
        timing: ClockTiming,
        queue_step: Duration,
        sources: RandomSources,
    ) -> Self {
        let clock = VirtualClock::new(api.clone(), launcher, timing, sources.clock);
        let orchestrator =
            AttemptOrchestrator::new(api.clone(), clock.reader(), sources.queue, queue_step);
        Self {
            api,
            clock,
            orchestrator,
            captcha: Mutex::new(CaptchaPad::new(sources.captcha)),
            cart: RwLock::new(Vec::new()),
            records: Mutex::new(Vec::new()),
            start_lock: Mutex::new(()),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.api.name()
    }

    /// Fetch the cart and keep it for index-based selection.
    pub async fn load_cart(&self) -> Result<Vec<CartCourse>, SimError> {
        let courses = self.api.fetch_cart_courses().await?;
        info!(backend = self.api.name(), courses = courses.len(), "cart loaded");
        *self.cart.write().await = courses.clone();
        Ok(courses)
    }

    pub async fn cart(&self) -> Vec<CartCourse> {
        self.cart.read().await.clone()
    }

    /// Begin a new run. A run that is already starting or running is left
    /// untouched, run state included.
    pub async fn start(&self, offset_seconds: u32) -> Result<SessionStarted, SimError> {
        let _starting = self.start_lock.lock().await;
        if self.clock.phase().is_active() {
            return Err(SimError::InvalidState("practice is already running".into()));
        }

        self.orchestrator.reset_attempt_state();
        self.captcha.lock().await.reset();
        self.records.lock().await.clear();
        self.clock.start(offset_seconds).await
    }

    pub async fn stop(&self) -> Result<Option<SessionEnded>, SimError> {
        self.clock.stop(true).await
    }

    /// Called when a run ends on its own (cutoff or forced), never on a manual stop.
    pub async fn on_practice_end(&self, callback: EndCallback) {
        self.clock.set_end_callback(callback).await;
    }

    /// Submit the cart entry at `course_index` with the typed captcha.
    ///
    /// An index outside the cart counts as no selection.
    pub async fn submit(
        &self,
        course_index: Option<usize>,
        captcha_input: &str,
    ) -> Result<AttemptReport, SimError> {
        let selected = match course_index {
            Some(index) => self.cart.read().await.get(index).cloned(),
            None => None,
        };
        let course_id = selected.as_ref().map(|c| c.course_id);

        let (mut form, challenge) = {
            let mut pad = self.captcha.lock().await;
            pad.set_input(captcha_input);
            (AttemptForm::new(pad.take_input(), selected), pad.challenge().clone())
        };

        let result = self.orchestrator.submit(&mut form, &challenge).await;

        let record = match &result {
            Ok(report) => {
                self.captcha.lock().await.refresh();
                AttemptRecord {
                    course_id: report.context.course_id,
                    virtual_at: report.context.submitted_at,
                    diff_ms: report.context.diff_ms,
                    queue_steps: report.context.queue_steps,
                    outcome: RecordedOutcome::from(&report.outcome),
                }
            }
            Err(SimError::AttemptInFlight) => return result,
            Err(e) => {
                warn!(course_id = ?course_id, error = %e, "attempt failed");
                AttemptRecord {
                    course_id,
                    virtual_at: self.clock.reader().virtual_now().map(|(now, _)| now),
                    diff_ms: None,
                    queue_steps: 0,
                    outcome: RecordedOutcome::RemoteError,
                }
            }
        };
        self.records.lock().await.push(record);

        result
    }

    pub async fn summary(&self) -> RunSummary {
        RunSummary::from_records(&self.records.lock().await)
    }

    pub async fn records(&self) -> Vec<AttemptRecord> {
        self.records.lock().await.clone()
    }

    pub async fn captcha_challenge(&self) -> CaptchaChallenge {
        self.captcha.lock().await.challenge().clone()
    }

    pub async fn refresh_captcha(&self) -> CaptchaChallenge {
        let mut pad = self.captcha.lock().await;
        pad.refresh();
        pad.challenge().clone()
    }

    pub fn clock(&self) -> ClockReader {
        self.clock.reader()
    }

    pub fn warning(&self) -> WarningState {
        self.orchestrator.warning()
    }

    pub fn acknowledge_warning(&self) {
        self.orchestrator.acknowledge_warning();
    }

    pub fn subscribe_waiting(&self) -> watch::Receiver<Option<QueueState>> {
        self.orchestrator.subscribe_waiting()
    }

    pub fn orchestrator(&self) -> &AttemptOrchestrator {
        &self.orchestrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ChannelLauncher;
    use crate::random::testing::ScriptedRandom;
    use crate::testing::{cart_course, MockApi};
    use coursedrill_core::AttemptResponse;

    /// Draws for one challenge: the digits, then two neutral glyph styles.
    fn challenge_draws(first: i64, second: i64) -> Vec<i64> {
        let mut draws = vec![first, second];
        for _ in 0..2 {
            draws.extend([0, 0, 0, 2, 26]);
        }
        draws
    }

    fn session(api: Arc<MockApi>) -> (Arc<PracticeSession>, Arc<ChannelLauncher>) {
        let launcher = Arc::new(ChannelLauncher::new());
        let sources = RandomSources {
            clock: Box::new(SeededRandom::from_seed(11)),
            queue: Box::new(ScriptedRandom {
                default_int: Some(0),
                default_unit: 0.5,
                ..ScriptedRandom::default()
            }),
            // construction draws "12", the reset on start draws "37",
            // later refreshes fall back to the midpoint "44"
            captcha: Box::new(ScriptedRandom::with_ints(
                &[challenge_draws(1, 2), challenge_draws(3, 7)].concat(),
            )),
        };
        let session = PracticeSession::with_sources(
            api,
            launcher.clone(),
            ClockTiming::default(),
            Duration::from_millis(500),
            sources,
        );
        (Arc::new(session), launcher)
    }

    fn api_with_cart() -> Arc<MockApi> {
        Arc::new(MockApi::with_cart(vec![cart_course(1), cart_course(2)]))
    }

    #[tokio::test(start_paused = true)]
    async fn test_offset_thirty_reaches_target_without_queue() {
        let api = api_with_cart();
        let (session, _launcher) = session(api.clone());
        session.load_cart().await.unwrap();
        session.start(30).await.unwrap();

        assert_eq!(session.captcha_challenge().await.canonical(), "37");
        tokio::time::sleep(Duration::from_secs(30)).await;

        let report = session.submit(Some(1), "37").await.unwrap();
        assert_eq!(report.outcome, AttemptOutcome::Succeeded { course_id: 2 });
        assert_eq!(report.context.diff_ms, Some(0));
        assert_eq!(report.context.queue_steps, 0);
        assert_eq!(api.attempts(), 1);

        // a completed pipeline always brings a fresh challenge
        assert_eq!(session.captcha_challenge().await.canonical(), "44");

        let summary = session.summary().await;
        assert_eq!(summary.total_attempts, 1);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.fastest_diff_ms, Some(0));

        session.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_before_start_is_recorded_locally() {
        let api = api_with_cart();
        let (session, _launcher) = session(api.clone());
        session.load_cart().await.unwrap();

        let report = session.submit(Some(0), "12").await.unwrap();
        assert_eq!(report.outcome.warning(), WarningState::PracticeNotStarted);
        assert_eq!(session.warning(), WarningState::PracticeNotStarted);
        assert_eq!(api.attempts(), 0);

        session.acknowledge_warning();
        assert_eq!(session.warning(), WarningState::None);

        let summary = session.summary().await;
        assert_eq!(summary.rejected_locally, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_index_is_not_chosen() {
        let api = api_with_cart();
        let (session, _launcher) = session(api.clone());
        session.load_cart().await.unwrap();
        session.start(15).await.unwrap();

        let report = session.submit(Some(7), "37").await.unwrap();
        assert_eq!(report.outcome.warning(), WarningState::NotChosen);
        let report = session.submit(None, "37").await.unwrap();
        assert_eq!(report.outcome.warning(), WarningState::NotChosen);

        session.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_error_keeps_challenge() {
        let api = api_with_cart();
        api.push_attempt(Err(SimError::remote(None, "")));
        let (session, _launcher) = session(api.clone());
        session.load_cart().await.unwrap();
        session.start(15).await.unwrap();
        tokio::time::sleep(Duration::from_secs(15)).await;

        let err = session.submit(Some(0), "37").await.unwrap_err();
        assert!(err.is_remote());
        assert_eq!(session.captcha_challenge().await.canonical(), "37");

        let records = session.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, RecordedOutcome::RemoteError);
        assert_eq!(session.summary().await.remote_errors, 1);

        session.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_clears_run_state() {
        let api = api_with_cart();
        api.push_attempt(Ok(AttemptResponse { is_success: false, message: String::new() }));
        let (session, _launcher) = session(api.clone());
        session.load_cart().await.unwrap();

        session.start(15).await.unwrap();
        tokio::time::sleep(Duration::from_secs(15)).await;
        let report = session.submit(Some(0), "37").await.unwrap();
        assert_eq!(report.outcome.warning(), WarningState::QuotaOver);
        assert!(session.orchestrator().full_course_ids().contains(&1));
        session.stop().await.unwrap();

        // still sticky after the run is over
        assert!(session.orchestrator().full_course_ids().contains(&1));

        session.start(15).await.unwrap();
        assert!(session.orchestrator().full_course_ids().is_empty());
        assert!(session.records().await.is_empty());
        assert_eq!(session.warning(), WarningState::None);

        session.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_during_run_keeps_run_state() {
        let api = api_with_cart();
        api.push_attempt(Ok(AttemptResponse { is_success: false, message: String::new() }));
        let (session, _launcher) = session(api.clone());
        session.load_cart().await.unwrap();

        session.start(15).await.unwrap();
        tokio::time::sleep(Duration::from_secs(15)).await;
        let report = session.submit(Some(0), "37").await.unwrap();
        assert_eq!(report.outcome.warning(), WarningState::QuotaOver);
        let challenge = session.captcha_challenge().await;

        let err = session.start(30).await.unwrap_err();
        assert!(matches!(err, SimError::InvalidState(_)));
        assert!(session.clock().is_running());
        assert!(session.orchestrator().full_course_ids().contains(&1));
        assert_eq!(session.records().await.len(), 1);
        assert_eq!(session.captcha_challenge().await, challenge);
        assert_eq!(api.starts(), 1);

        // the full course still short-circuits without a remote call
        let report = session.submit(Some(0), &challenge.canonical()).await.unwrap();
        assert_eq!(report.outcome.warning(), WarningState::QuotaOver);
        assert_eq!(api.attempts(), 1);

        session.stop().await.unwrap();
    }
}
