//! Test doubles shared by the engine's unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use coursedrill_core::{
    AttemptRequest, AttemptResponse, CartCourse, Course, PracticeApi, SessionEnded,
    SessionStarted, SimError, StartSessionRequest,
};

/// Scriptable backend that counts every call.
#[derive(Default)]
pub struct MockApi {
    pub start_calls: AtomicUsize,
    pub end_calls: AtomicUsize,
    pub attempt_calls: AtomicUsize,
    pub start_results: Mutex<VecDeque<Result<SessionStarted, SimError>>>,
    pub end_fails: Mutex<bool>,
    pub attempt_results: Mutex<VecDeque<Result<AttemptResponse, SimError>>>,
    pub attempts: Mutex<Vec<AttemptRequest>>,
    pub starts: Mutex<Vec<StartSessionRequest>>,
    pub cart: Vec<CartCourse>,
    /// Server-side view: a start succeeded and no end has followed yet.
    pub session_open: AtomicBool,
    pub start_delay: Mutex<Option<Duration>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cart(cart: Vec<CartCourse>) -> Self {
        Self { cart, ..Self::default() }
    }

    pub fn push_start(&self, result: Result<SessionStarted, SimError>) {
        self.start_results.lock().unwrap().push_back(result);
    }

    pub fn push_attempt(&self, result: Result<AttemptResponse, SimError>) {
        self.attempt_results.lock().unwrap().push_back(result);
    }

    /// Every start call takes `delay` before answering.
    pub fn slow_start(&self, delay: Duration) {
        *self.start_delay.lock().unwrap() = Some(delay);
    }

    pub fn is_session_open(&self) -> bool {
        self.session_open.load(Ordering::SeqCst)
    }

    pub fn fail_end(&self) {
        *self.end_fails.lock().unwrap() = true;
    }

    pub fn starts(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn ends(&self) -> usize {
        self.end_calls.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> usize {
        self.attempt_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PracticeApi for MockApi {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start_session(&self, request: &StartSessionRequest) -> Result<SessionStarted, SimError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.starts.lock().unwrap().push(request.clone());
        let delay = *self.start_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let result = self
            .start_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SessionStarted::default()));
        if result.is_ok() {
            self.session_open.store(true, Ordering::SeqCst);
        }
        result
    }

    async fn end_session(&self) -> Result<SessionEnded, SimError> {
        self.end_calls.fetch_add(1, Ordering::SeqCst);
        self.session_open.store(false, Ordering::SeqCst);
        if *self.end_fails.lock().unwrap() {
            return Err(SimError::remote(Some(500), ""));
        }
        Ok(SessionEnded { total_attempts: Some(self.attempts() as u32) })
    }

    async fn submit_attempt(&self, request: &AttemptRequest) -> Result<AttemptResponse, SimError> {
        self.attempt_calls.fetch_add(1, Ordering::SeqCst);
        self.attempts.lock().unwrap().push(request.clone());
        self.attempt_results.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(AttemptResponse { is_success: true, message: "ok".into() })
        })
    }

    async fn fetch_cart_courses(&self) -> Result<Vec<CartCourse>, SimError> {
        Ok(self.cart.clone())
    }
}

pub fn cart_course(id: u64) -> CartCourse {
    CartCourse {
        course_id: id,
        course: Course {
            course_id: id,
            title: format!("Data Structures {}", id),
            number: format!("CSE20{:02}", id),
            lecture: "01".into(),
            capacity: 40,
            credits: 3,
        },
        cart_count: 180,
    }
}
