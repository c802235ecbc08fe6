//! Library consistency checks.
//!
//! The verifier walks the database and the blob store in three stages and
//! reports every inconsistency to a [`VerifyObserver`], which decides what
//! gets repaired.
//!
//! # Example
//!
//! ```ignore
//! use sampledrawer_core::verifier::{Answer, FixedAnswer, LibraryVerifier};
//!
//! let report = LibraryVerifier::new(&library).verify(&mut FixedAnswer(Answer::No))?;
//! println!("{} issues", report.issues);
//! ```

mod runner;
mod types;

pub use runner::LibraryVerifier;
pub use types::{
    Answer, FixedAnswer, Progress, Question, QuestionKind, VerifyObserver, VerifyReport, STAGES,
};
