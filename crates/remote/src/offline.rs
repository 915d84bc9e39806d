//! In-process stand-in for the practice server.
//! Lets a rehearsal run end to end with no network at all.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{debug, info};

use coursedrill_core::config::OfflineConfig;
use coursedrill_core::{
    AttemptRequest, AttemptResponse, CartCourse, PracticeApi, SessionEnded, SessionStarted,
    SimError, StartSessionRequest,
};

#[derive(Debug, Default)]
struct OfflineState {
    active: Option<StartSessionRequest>,
    sessions_started: u32,
    attempts: u32,
}

pub struct OfflinePracticeApi {
    cart: Vec<CartCourse>,
    state: Mutex<OfflineState>,
    rng: Mutex<StdRng>,
}

impl OfflinePracticeApi {
    pub fn new(cart: Vec<CartCourse>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            cart,
            state: Mutex::new(OfflineState::default()),
            rng: Mutex::new(rng),
        }
    }

    pub fn from_config(config: &OfflineConfig, seed: Option<u64>) -> Self {
        let cart = config.courses.iter().map(|c| c.to_cart_course()).collect();
        Self::new(cart, seed)
    }

    pub async fn is_session_active(&self) -> bool {
        self.state.lock().await.active.is_some()
    }

    pub async fn sessions_started(&self) -> u32 {
        self.state.lock().await.sessions_started
    }

    /// Chance that one attempt lands a seat.
    fn success_probability(request: &AttemptRequest) -> f64 {
        if request.capacity == 0 {
            return 0.0;
        }
        let competitors = request.total_competitors.max(request.capacity);
        request.capacity as f64 / competitors as f64
    }
}

#[async_trait]
impl PracticeApi for OfflinePracticeApi {
    fn name(&self) -> &str {
        "offline"
    }

    async fn start_session(&self, request: &StartSessionRequest) -> Result<SessionStarted, SimError> {
        let mut state = self.state.lock().await;
        if state.active.is_some() {
            return Err(SimError::SessionConflict("practice session already active".into()));
        }

        state.active = Some(request.clone());
        state.sessions_started += 1;
        state.attempts = 0;
        info!(option = %request.option, delay_ms = request.delay, "offline practice session started");

        Ok(SessionStarted {
            session_id: Some(format!("offline-{}", state.sessions_started)),
            target_time: Some("08:30:00".to_string()),
            time_limit_seconds: Some(request.option.seconds() + 180),
        })
    }

    async fn end_session(&self) -> Result<SessionEnded, SimError> {
        let mut state = self.state.lock().await;
        match state.active.take() {
            Some(_) => {
                info!(attempts = state.attempts, "offline practice session ended");
                Ok(SessionEnded { total_attempts: Some(state.attempts) })
            }
            None => Ok(SessionEnded::default()),
        }
    }

    async fn submit_attempt(&self, request: &AttemptRequest) -> Result<AttemptResponse, SimError> {
        {
            let mut state = self.state.lock().await;
            if state.active.is_none() {
                return Err(SimError::remote(Some(400), "No practice session is active."));
            }
            state.attempts += 1;
        }

        let p = Self::success_probability(request);
        let roll: f64 = self.rng.lock().await.gen();
        let is_success = roll < p;
        debug!(course_id = request.course_id, p, roll, is_success, "offline attempt");

        Ok(AttemptResponse {
            is_success,
            message: if is_success {
                "Registration completed.".to_string()
            } else {
                "The course is full.".to_string()
            },
        })
    }

    async fn fetch_cart_courses(&self) -> Result<Vec<CartCourse>, SimError> {
        Ok(self.cart.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursedrill_core::{Course, OffsetOption};

    fn cart_course(id: u64, capacity: u32, cart_count: u32) -> CartCourse {
        CartCourse {
            course_id: id,
            course: Course {
                course_id: id,
                title: format!("Course {}", id),
                number: format!("CSE{}", 1000 + id),
                lecture: "01".into(),
                capacity,
                credits: 3,
            },
            cart_count,
        }
    }

    fn start_request() -> StartSessionRequest {
        StartSessionRequest { option: OffsetOption::ThirtySeconds, delay: 100 }
    }

    #[tokio::test]
    async fn test_second_start_conflicts_until_ended() {
        let api = OfflinePracticeApi::new(vec![], Some(1));
        api.start_session(&start_request()).await.unwrap();

        let err = api.start_session(&start_request()).await.unwrap_err();
        assert!(matches!(err, SimError::SessionConflict(_)));

        api.end_session().await.unwrap();
        api.start_session(&start_request()).await.unwrap();
        assert_eq!(api.sessions_started().await, 2);
    }

    #[tokio::test]
    async fn test_end_without_session_is_harmless() {
        let api = OfflinePracticeApi::new(vec![], Some(1));
        let ended = api.end_session().await.unwrap();
        assert_eq!(ended.total_attempts, None);
    }

    #[tokio::test]
    async fn test_attempts_counted_and_bounded_by_capacity() {
        let api = OfflinePracticeApi::new(vec![cart_course(1, 0, 10), cart_course(2, 50, 10)], Some(9));
        api.start_session(&start_request()).await.unwrap();

        let cart = api.fetch_cart_courses().await.unwrap();
        let closed = api.submit_attempt(&AttemptRequest::for_cart_course(&cart[0])).await.unwrap();
        assert!(!closed.is_success);

        // more seats than competitors always succeeds
        let open = api.submit_attempt(&AttemptRequest::for_cart_course(&cart[1])).await.unwrap();
        assert!(open.is_success);

        let ended = api.end_session().await.unwrap();
        assert_eq!(ended.total_attempts, Some(2));
    }

    #[tokio::test]
    async fn test_attempt_without_session_is_rejected() {
        let api = OfflinePracticeApi::new(vec![cart_course(1, 10, 10)], Some(3));
        let err = api
            .submit_attempt(&AttemptRequest { course_id: 1, total_competitors: 10, capacity: 10 })
            .await
            .unwrap_err();
        assert!(err.is_remote());
    }
}
