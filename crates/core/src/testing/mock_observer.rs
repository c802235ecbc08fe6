//! Scripted verifier observer for testing.

use std::collections::VecDeque;

use crate::verifier::{Answer, Progress, Question, VerifyObserver};

/// Observer answering from a script and recording everything it sees.
///
/// Once the script runs out every question gets the fallback answer.
#[derive(Debug)]
pub struct ScriptedObserver {
    answers: VecDeque<Answer>,
    fallback: Answer,
    /// Questions asked, in order.
    pub questions: Vec<Question>,
    /// Progress reports, in order.
    pub progress: Vec<Progress>,
}

impl ScriptedObserver {
    /// Answer every question with `fallback`.
    pub fn new(fallback: Answer) -> Self {
        Self::with_script([], fallback)
    }

    pub fn with_script(answers: impl IntoIterator<Item = Answer>, fallback: Answer) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            fallback,
            questions: Vec::new(),
            progress: Vec::new(),
        }
    }

    /// Progress reports that carried an error message.
    pub fn errors(&self) -> Vec<&str> {
        self.progress
            .iter()
            .filter_map(|p| p.error.as_deref())
            .collect()
    }
}

impl VerifyObserver for ScriptedObserver {
    fn progress(&mut self, progress: &Progress) {
        self.progress.push(progress.clone());
    }

    fn ask(&mut self, question: &Question) -> Answer {
        self.questions.push(question.clone());
        self.answers.pop_front().unwrap_or(self.fallback)
    }
}
