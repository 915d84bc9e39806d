use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use coursedrill_core::{AttemptRequest, CourseId, PracticeApi, SimError};

use crate::captcha::CaptchaChallenge;
use crate::clock::{ClockPhase, ClockReader};
use crate::core::*;
use crate::queue::{self, QueueState};
use crate::random::BoxedRandom;

/// Outcome of one submit plus the trail it left
#[derive(Debug)]
pub struct AttemptReport {
    pub outcome: AttemptOutcome,
    pub context: AttemptContext,
}

/// Clears the in-flight flag however the pipeline exits.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs the validate → wait → submit pipeline for registration attempts
pub struct AttemptOrchestrator {
    api: Arc<dyn PracticeApi>,
    clock: ClockReader,
    rng: Mutex<BoxedRandom>,
    queue_step: Duration,
    succeeded: Arc<DashSet<CourseId>>,
    full: Arc<DashSet<CourseId>>,
    warning: watch::Sender<WarningState>,
    waiting: watch::Sender<Option<QueueState>>,
    in_flight: AtomicBool,
}

impl AttemptOrchestrator {
    pub fn new(
        api: Arc<dyn PracticeApi>,
        clock: ClockReader,
        rng: BoxedRandom,
        queue_step: Duration,
    ) -> Self {
        let (warning, _) = watch::channel(WarningState::None);
        let (waiting, _) = watch::channel(None);
        Self {
            api,
            clock,
            rng: Mutex::new(rng),
            queue_step: queue_step.max(Duration::from_millis(1)),
            succeeded: Arc::new(DashSet::new()),
            full: Arc::new(DashSet::new()),
            warning,
            waiting,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn warning(&self) -> WarningState {
        *self.warning.borrow()
    }

    pub fn acknowledge_warning(&self) {
        self.warning.send_replace(WarningState::None);
    }

    pub fn subscribe_warning(&self) -> watch::Receiver<WarningState> {
        self.warning.subscribe()
    }

    /// Queue state while a waiting phase is active, `None` otherwise.
    pub fn subscribe_waiting(&self) -> watch::Receiver<Option<QueueState>> {
        self.waiting.subscribe()
    }

    pub fn succeeded_course_ids(&self) -> Arc<DashSet<CourseId>> {
        Arc::clone(&self.succeeded)
    }

    pub fn full_course_ids(&self) -> Arc<DashSet<CourseId>> {
        Arc::clone(&self.full)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Must be called by the owner whenever a new practice run starts.
    pub fn reset_attempt_state(&self) {
        self.succeeded.clear();
        self.full.clear();
        self.warning.send_replace(WarningState::None);
        debug!("attempt state reset");
    }

    /// Run one registration attempt.
    ///
    /// Local validation failures come back as `Ok` with a warning outcome.
    /// `Err` is reserved for remote failures and for a submit that arrives
    /// while another is still in flight.
    pub async fn submit(
        &self,
        form: &mut AttemptForm,
        challenge: &CaptchaChallenge,
    ) -> Result<AttemptReport, SimError> {
        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or(SimError::AttemptInFlight)?;
        let mut ctx = AttemptContext::new(form.selected.as_ref().map(|c| c.course_id));

        if !self.clock.is_running() {
            form.clear_captcha();
            form.clear_selection();
            return Ok(self.reject(ctx, WarningState::PracticeNotStarted));
        }

        let Some(course) = form.selected.clone() else {
            form.clear_captcha();
            return Ok(self.reject(ctx, WarningState::NotChosen));
        };

        // the typed code is consumed whatever happens next
        let typed = std::mem::take(&mut form.captcha_input);
        if !challenge.validate(&typed) {
            form.clear_selection();
            return Ok(self.reject(ctx, WarningState::CaptchaError));
        }

        let Some((now, target)) = self.clock.virtual_now() else {
            form.clear_selection();
            return Ok(self.reject(ctx, WarningState::PracticeNotStarted));
        };
        ctx.submitted_at = Some(now);

        if now < target {
            form.clear_selection();
            return Ok(self.reject(ctx, WarningState::BeforeTime));
        }
        if self.succeeded.contains(&course.course_id) {
            form.clear_selection();
            return Ok(self.reject(ctx, WarningState::AlreadyAttempted));
        }
        if self.full.contains(&course.course_id) {
            form.clear_selection();
            return Ok(self.reject(ctx, WarningState::QuotaOver));
        }

        let diff_ms = (now - target).num_milliseconds();
        ctx.diff_ms = Some(diff_ms);

        let initial = {
            let mut rng = self.rng.lock().await;
            queue::estimate_from_elapsed(diff_ms as f64, rng.as_mut())
        };
        debug!(course_id = course.course_id, diff_ms, queue = initial.queue_count, "queue estimate");

        if !initial.is_clear() && !self.wait_in_queue(initial, &mut ctx).await {
            info!(course_id = course.course_id, "practice stopped while waiting in queue");
            ctx.transition(AttemptStage::Aborted { reason: "cancelled".into() }, None);
            return Ok(AttemptReport { outcome: AttemptOutcome::Cancelled, context: ctx });
        }

        ctx.transition(AttemptStage::Submitting, self.clock.virtual_now().map(|(n, _)| n));
        let request = AttemptRequest::for_cart_course(&course);
        let response = match self.api.submit_attempt(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(course_id = course.course_id, error = %e, "attempt call failed");
                return Err(e);
            }
        };

        if !response.is_success {
            self.full.insert(course.course_id);
            info!(
                course_id = course.course_id,
                number = %course.course.number,
                diff_ms,
                "course full"
            );
            return Ok(self.reject(ctx, WarningState::QuotaOver));
        }

        form.clear_selection();
        self.succeeded.insert(course.course_id);
        self.warning.send_replace(WarningState::None);
        ctx.transition(AttemptStage::Finished, None);
        info!(
            course_id = course.course_id,
            number = %course.course.number,
            diff_ms,
            queue_steps = ctx.queue_steps,
            "✓ registered"
        );

        Ok(AttemptReport {
            outcome: AttemptOutcome::Succeeded { course_id: course.course_id },
            context: ctx,
        })
    }

    fn reject(&self, mut ctx: AttemptContext, warning: WarningState) -> AttemptReport {
        debug!(warning = %warning, course_id = ?ctx.course_id, "attempt rejected");
        self.warning.send_replace(warning);
        ctx.transition(AttemptStage::Aborted { reason: warning.key().to_string() }, None);
        AttemptReport {
            outcome: AttemptOutcome::Warning(warning),
            context: ctx,
        }
    }

    /// Evolve the queue until it drains. Returns false if the run stopped first.
    async fn wait_in_queue(&self, initial: QueueState, ctx: &mut AttemptContext) -> bool {
        let mut status = self.clock.watch();
        let mut state = initial;
        self.waiting.send_replace(Some(state));
        ctx.transition(AttemptStage::Waiting(state), None);

        let mut ticker = tokio::time::interval(self.queue_step);
        ticker.tick().await;

        let drained = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    state = {
                        let mut rng = self.rng.lock().await;
                        queue::evolve(state.queue_count, rng.as_mut())
                    };
                    self.waiting.send_replace(Some(state));
                    ctx.record_queue_step(state);
                    if state.is_clear() {
                        break true;
                    }
                }
                changed = status.changed() => {
                    if changed.is_err() || status.borrow_and_update().phase != ClockPhase::Running {
                        break false;
                    }
                }
            }
        };

        self.waiting.send_replace(None);
        drained
    }
}
