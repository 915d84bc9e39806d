use serde::Serialize;

use coursedrill_core::Course;

/// The single active reason an attempt could not go through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningState {
    #[default]
    None,
    PracticeNotStarted,
    NotChosen,
    CaptchaError,
    BeforeTime,
    AlreadyAttempted,
    QuotaOver,
}

impl WarningState {
    pub fn is_none(self) -> bool {
        self == WarningState::None
    }

    /// Stable key, e.g. for log fields and front-end lookups.
    pub fn key(self) -> &'static str {
        match self {
            WarningState::None => "none",
            WarningState::PracticeNotStarted => "practiceNotStarted",
            WarningState::NotChosen => "notChosen",
            WarningState::CaptchaError => "captchaError",
            WarningState::BeforeTime => "beforeTime",
            WarningState::AlreadyAttempted => "alreadyAttempted",
            WarningState::QuotaOver => "quotaOver",
        }
    }

    /// User-facing text. Quota messages name the course when one is given.
    pub fn message(self, course: Option<&Course>) -> String {
        match self {
            WarningState::None => String::new(),
            WarningState::PracticeNotStarted => "Start the practice session first.".to_string(),
            WarningState::NotChosen => "Select a course to register for.".to_string(),
            WarningState::CaptchaError => "The verification code does not match.".to_string(),
            WarningState::BeforeTime => "Registration has not opened yet.".to_string(),
            WarningState::AlreadyAttempted => {
                "You have already registered for this course.".to_string()
            }
            WarningState::QuotaOver => match course {
                Some(c) => format!(
                    "{} ({}-{}) has no seats left.",
                    c.title, c.number, c.lecture
                ),
                None => "The course has no seats left.".to_string(),
            },
        }
    }
}

impl std::fmt::Display for WarningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_message_interpolates_course() {
        let course = Course {
            course_id: 4,
            title: "Linear Algebra".into(),
            number: "MAT2010".into(),
            lecture: "03".into(),
            capacity: 60,
            credits: 3,
        };
        assert_eq!(
            WarningState::QuotaOver.message(Some(&course)),
            "Linear Algebra (MAT2010-03) has no seats left."
        );
        assert_eq!(WarningState::QuotaOver.message(None), "The course has no seats left.");
    }

    #[test]
    fn test_default_is_none() {
        assert!(WarningState::default().is_none());
        assert_eq!(WarningState::None.message(None), "");
        assert_eq!(WarningState::BeforeTime.to_string(), "beforeTime");
    }
}
