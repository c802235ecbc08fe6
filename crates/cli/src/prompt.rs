//! Interactive answers to verifier questions.

use std::io::{self, BufRead, Write};

use sampledrawer_core::verifier::{Answer, Progress, Question, VerifyObserver};

/// Asks on stderr and reads answers from stdin.
///
/// End of input answers "No" to everything that follows.
#[derive(Debug, Default)]
pub struct TerminalObserver {
    eof: bool,
}

impl TerminalObserver {
    pub fn new() -> Self {
        Self { eof: false }
    }
}

impl VerifyObserver for TerminalObserver {
    fn progress(&mut self, progress: &Progress) {
        eprintln!("{}", progress);
    }

    fn ask(&mut self, question: &Question) -> Answer {
        if self.eof {
            return Answer::No;
        }
        let stdin = io::stdin();
        loop {
            eprint!("{} [y]es/[n]o/[a]lways/n[e]ver: ", question.prompt());
            let _ = io::stderr().flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => {
                    self.eof = true;
                    return Answer::No;
                }
                Ok(_) => {}
            }
            if let Some(answer) = line.trim().chars().next().and_then(Answer::from_key) {
                return answer;
            }
        }
    }
}
