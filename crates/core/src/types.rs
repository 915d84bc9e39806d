use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

pub type CourseId = u64;

/// Every practice backend implements this
#[async_trait]
pub trait PracticeApi: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Open a server-side practice session. Fails with
    /// `SimError::SessionConflict` when one is already active.
    async fn start_session(&self, request: &StartSessionRequest) -> Result<SessionStarted, SimError>;

    /// Close the active session. Safe to call when none is active.
    async fn end_session(&self) -> Result<SessionEnded, SimError>;

    async fn submit_attempt(&self, request: &AttemptRequest) -> Result<AttemptResponse, SimError>;

    async fn fetch_cart_courses(&self) -> Result<Vec<CartCourse>, SimError>;
}

/// The fixed, labeled offsets a practice run may begin at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OffsetOption {
    #[serde(rename = "60s")]
    SixtySeconds,
    #[serde(rename = "30s")]
    ThirtySeconds,
    #[serde(rename = "15s")]
    FifteenSeconds,
}

impl OffsetOption {
    pub const ALL: [OffsetOption; 3] = [
        OffsetOption::SixtySeconds,
        OffsetOption::ThirtySeconds,
        OffsetOption::FifteenSeconds,
    ];

    /// Unsupported values (including zero) fall back to thirty seconds.
    pub fn resolve(seconds: u32) -> Self {
        match seconds {
            60 => OffsetOption::SixtySeconds,
            15 => OffsetOption::FifteenSeconds,
            _ => OffsetOption::ThirtySeconds,
        }
    }

    pub fn seconds(self) -> u32 {
        match self {
            OffsetOption::SixtySeconds => 60,
            OffsetOption::ThirtySeconds => 30,
            OffsetOption::FifteenSeconds => 15,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OffsetOption::SixtySeconds => "60s",
            OffsetOption::ThirtySeconds => "30s",
            OffsetOption::FifteenSeconds => "15s",
        }
    }
}

impl Default for OffsetOption {
    fn default() -> Self {
        OffsetOption::ThirtySeconds
    }
}

impl std::fmt::Display for OffsetOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub option: OffsetOption,
    /// Desynchronization delay the client will wait before its clock runs.
    pub delay: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub target_time: Option<String>,
    #[serde(default)]
    pub time_limit_seconds: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEnded {
    #[serde(default)]
    pub total_attempts: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRequest {
    pub course_id: CourseId,
    pub total_competitors: u32,
    pub capacity: u32,
}

impl AttemptRequest {
    pub fn for_cart_course(cart: &CartCourse) -> Self {
        Self {
            course_id: cart.course_id,
            total_competitors: cart.cart_count,
            capacity: cart.course.capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResponse {
    pub is_success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub course_id: CourseId,
    pub title: String,
    /// Course code, e.g. "CSE3008".
    pub number: String,
    /// Lecture (section) number within the course.
    pub lecture: String,
    pub capacity: u32,
    #[serde(default)]
    pub credits: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartCourse {
    pub course_id: CourseId,
    pub course: Course,
    pub cart_count: u32,
}
