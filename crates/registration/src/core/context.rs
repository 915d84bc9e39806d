use chrono::NaiveDateTime;

use coursedrill_core::{CartCourse, CourseId};

use crate::queue::QueueState;

/// What the user has put into the registration form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptForm {
    pub captcha_input: String,
    pub selected: Option<CartCourse>,
}

impl AttemptForm {
    pub fn new(captcha_input: impl Into<String>, selected: Option<CartCourse>) -> Self {
        Self {
            captcha_input: captcha_input.into(),
            selected,
        }
    }

    pub fn clear_captcha(&mut self) {
        self.captcha_input.clear();
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }
}

/// Stages one submit walks through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptStage {
    Validating,
    Waiting(QueueState),
    Submitting,
    Finished,
    Aborted { reason: String },
}

#[derive(Debug, Clone)]
pub struct StageTransition {
    pub from: String,
    pub to: String,
    pub virtual_at: Option<NaiveDateTime>,
}

/// Context for one pass through the pipeline
#[derive(Debug)]
pub struct AttemptContext {
    pub stage: AttemptStage,
    pub course_id: Option<CourseId>,
    pub submitted_at: Option<NaiveDateTime>,
    pub diff_ms: Option<i64>,
    pub queue_steps: u32,
    pub evidence: Vec<StageTransition>,
}

impl AttemptContext {
    pub fn new(course_id: Option<CourseId>) -> Self {
        Self {
            stage: AttemptStage::Validating,
            course_id,
            submitted_at: None,
            diff_ms: None,
            queue_steps: 0,
            evidence: Vec::new(),
        }
    }

    /// Transition to a new stage
    pub fn transition(&mut self, stage: AttemptStage, virtual_at: Option<NaiveDateTime>) {
        let old = std::mem::replace(&mut self.stage, stage);
        self.evidence.push(StageTransition {
            from: format!("{:?}", old),
            to: format!("{:?}", self.stage),
            virtual_at,
        });
    }

    pub fn record_queue_step(&mut self, state: QueueState) {
        self.queue_steps += 1;
        self.stage = AttemptStage::Waiting(state);
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.stage, AttemptStage::Finished | AttemptStage::Aborted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_recorded() {
        let mut ctx = AttemptContext::new(Some(9));
        ctx.transition(AttemptStage::Waiting(QueueState::from_count(3200)), None);
        ctx.record_queue_step(QueueState::from_count(1500));
        ctx.transition(AttemptStage::Submitting, None);
        ctx.transition(AttemptStage::Finished, None);

        assert_eq!(ctx.evidence.len(), 3);
        assert_eq!(ctx.queue_steps, 1);
        assert!(ctx.is_terminal());
        assert!(ctx.evidence[0].from.starts_with("Validating"));
    }

    #[test]
    fn test_form_clearing() {
        let mut form = AttemptForm::new("42", None);
        form.clear_captcha();
        assert!(form.captcha_input.is_empty());
    }
}
