//! Types for the library verifier.

use std::fmt;

use serde::Serialize;

/// Number of verification stages.
pub const STAGES: usize = 3;

/// Where the verifier is, reported to the observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// 1-based stage number.
    pub stage: usize,
    pub stages: usize,
    pub stage_name: &'static str,
    /// Completion of the current stage, 0 to 100.
    pub percent: u8,
    /// Problem being reported, if any.
    pub error: Option<String>,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {} {:3}%",
            self.stage, self.stages, self.stage_name, self.percent
        )?;
        if let Some(error) = &self.error {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}

/// The kinds of repair the verifier can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QuestionKind {
    RemoveMissingItem,
    RemoveStaleTmpDir,
    RemoveUnknownFile,
    RemoveInvalidItem,
    FixBrokenTagAssignments,
    FixBrokenCustomValues,
    FixTagCounts,
}

impl QuestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::RemoveMissingItem => "remove_missing_item",
            QuestionKind::RemoveStaleTmpDir => "remove_stale_tmp_dir",
            QuestionKind::RemoveUnknownFile => "remove_unknown_file",
            QuestionKind::RemoveInvalidItem => "remove_invalid_item",
            QuestionKind::FixBrokenTagAssignments => "fix_broken_tag_assignments",
            QuestionKind::FixBrokenCustomValues => "fix_broken_custom_values",
            QuestionKind::FixTagCounts => "fix_tag_counts",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            QuestionKind::RemoveMissingItem => "Remove item?",
            QuestionKind::RemoveStaleTmpDir => "Remove stale temporary directory?",
            QuestionKind::RemoveUnknownFile => "Remove unknown file?",
            QuestionKind::RemoveInvalidItem => "Remove invalid item?",
            QuestionKind::FixBrokenTagAssignments => "Fix broken tag assignments?",
            QuestionKind::FixBrokenCustomValues => "Fix broken custom values?",
            QuestionKind::FixTagCounts => "Fix tag counts?",
        }
    }
}

/// A repair offered to the observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub kind: QuestionKind,
    /// The problem found.
    pub message: String,
}

impl Question {
    pub fn prompt(&self) -> &'static str {
        self.kind.prompt()
    }
}

/// Reply to a [`Question`].
///
/// `Always` and `Never` also answer every later question of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Answer {
    Yes,
    No,
    Always,
    Never,
}

impl Answer {
    pub fn is_yes(self) -> bool {
        matches!(self, Answer::Yes | Answer::Always)
    }

    pub fn is_saved(self) -> bool {
        matches!(self, Answer::Always | Answer::Never)
    }

    /// Single-key shortcuts: `y`, `n`, `a`lways, n`e`ver.
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'y' => Some(Answer::Yes),
            'n' => Some(Answer::No),
            'a' => Some(Answer::Always),
            'e' => Some(Answer::Never),
            _ => None,
        }
    }
}

/// What a verification run found and changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub items_checked: usize,
    pub items_removed: usize,
    pub files_removed: usize,
    pub dirs_removed: usize,
    pub links_removed: usize,
    pub tag_counts_fixed: bool,
    /// Every problem reported, answered or not.
    pub issues: usize,
}

/// Receives progress and answers questions during verification.
///
/// Called with the library connection locked: implementations must not
/// call back into the library.
pub trait VerifyObserver {
    fn progress(&mut self, progress: &Progress);

    fn ask(&mut self, question: &Question) -> Answer;
}

/// Observer answering every question the same way and logging progress.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub Answer);

impl VerifyObserver for FixedAnswer {
    fn progress(&mut self, progress: &Progress) {
        match &progress.error {
            Some(error) => tracing::warn!(target: "verifier", stage = progress.stage, "{}", error),
            None => tracing::debug!(target: "verifier", "{}", progress),
        }
    }

    fn ask(&mut self, _question: &Question) -> Answer {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_keys() {
        assert_eq!(Answer::from_key('Y'), Some(Answer::Yes));
        assert_eq!(Answer::from_key('e'), Some(Answer::Never));
        assert_eq!(Answer::from_key('x'), None);
        assert!(Answer::Always.is_yes());
        assert!(!Answer::Never.is_yes());
        assert!(Answer::Never.is_saved());
    }

    #[test]
    fn test_progress_display() {
        let progress = Progress {
            stage: 2,
            stages: STAGES,
            stage_name: "Checking files",
            percent: 7,
            error: Some("oops".into()),
        };
        assert_eq!(progress.to_string(), "[2/3] Checking files   7%: oops");
    }
}
