use serde::Serialize;

use crate::models::attempt::QuizAttempt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrollTarget {
    pub index: usize,
    pub question_id: String,
    pub anchor: String,
    pub offset_px: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelEntry {
    pub index: usize,
    pub number: usize,
    pub question_id: String,
    pub answered: bool,
    pub focused: bool,
}

pub fn anchor_for(question_id: &str) -> String {
    format!("question-{}", question_id)
}

/// Page-owned scroll controller. It only ever borrows the attempt
/// immutably, so navigating cannot change an answer.
#[derive(Debug, Clone)]
pub struct NavigationController {
    header_offset_px: u32,
    focused: Option<usize>,
}

impl NavigationController {
    pub fn new(header_offset_px: u32) -> Self {
        Self {
            header_offset_px,
            focused: None,
        }
    }

    pub fn focused(&self) -> Option<usize> {
        self.focused
    }

    /// Out-of-range indices and submitted attempts yield `None`.
    pub fn scroll_to_question(&mut self, attempt: &QuizAttempt, index: i64) -> Option<ScrollTarget> {
        if attempt.submitted {
            tracing::debug!(index, "navigation disabled after submit");
            return None;
        }
        let idx = usize::try_from(index)
            .ok()
            .filter(|i| *i < attempt.questions.len());
        let Some(idx) = idx else {
            tracing::debug!(index, count = attempt.questions.len(), "scroll index out of range");
            return None;
        };

        let question = &attempt.questions[idx];
        self.focused = Some(idx);
        Some(ScrollTarget {
            index: idx,
            question_id: question.id.clone(),
            anchor: anchor_for(&question.id),
            offset_px: self.header_offset_px,
        })
    }

    /// Entries for the question-number panel, in display order.
    pub fn panel(&self, attempt: &QuizAttempt) -> Vec<PanelEntry> {
        attempt
            .questions
            .iter()
            .enumerate()
            .map(|(index, q)| PanelEntry {
                index,
                number: index + 1,
                question_id: q.id.clone(),
                answered: q.is_answered(),
                focused: self.focused == Some(index),
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.focused = None;
    }
}
