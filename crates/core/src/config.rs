use chrono::NaiveTime;
use serde::Deserialize;

use crate::types::{CartCourse, Course};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub practice: PracticeConfig,
    #[serde(default)]
    pub offline: OfflineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub base_url: String,
    /// Bearer token for the practice API. Empty means anonymous.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PracticeConfig {
    #[serde(default = "default_offset")]
    pub default_offset_seconds: u32,
    #[serde(default = "default_target_time")]
    pub target_time: NaiveTime,
    #[serde(default = "default_cutoff_time")]
    pub cutoff_time: NaiveTime,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_queue_step_interval")]
    pub queue_step_interval_ms: u64,
    #[serde(default = "default_max_desync")]
    pub max_desync_ms: u64,
    /// Fixed seed for every random draw. Unset means entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            default_offset_seconds: default_offset(),
            target_time: default_target_time(),
            cutoff_time: default_cutoff_time(),
            tick_interval_ms: default_tick_interval(),
            queue_step_interval_ms: default_queue_step_interval(),
            max_desync_ms: default_max_desync(),
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OfflineConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub courses: Vec<OfflineCourse>,
}

/// One cart entry served by the offline stand-in backend.
#[derive(Debug, Deserialize, Clone)]
pub struct OfflineCourse {
    pub course_id: u64,
    pub title: String,
    pub number: String,
    pub lecture: String,
    pub capacity: u32,
    #[serde(default)]
    pub credits: u8,
    pub cart_count: u32,
}

impl OfflineCourse {
    pub fn to_cart_course(&self) -> CartCourse {
        CartCourse {
            course_id: self.course_id,
            course: Course {
                course_id: self.course_id,
                title: self.title.clone(),
                number: self.number.clone(),
                lecture: self.lecture.clone(),
                capacity: self.capacity,
                credits: self.credits,
            },
            cart_count: self.cart_count,
        }
    }
}

fn default_connect_timeout() -> u64 { 5 }
fn default_request_timeout() -> u64 { 15 }
fn default_offset() -> u32 { 30 }
fn default_target_time() -> NaiveTime { NaiveTime::from_hms_opt(8, 30, 0).unwrap_or(NaiveTime::MIN) }
fn default_cutoff_time() -> NaiveTime { NaiveTime::from_hms_opt(8, 33, 0).unwrap_or(NaiveTime::MIN) }
fn default_tick_interval() -> u64 { 1000 }
fn default_queue_step_interval() -> u64 { 500 }
fn default_max_desync() -> u64 { 999 }
