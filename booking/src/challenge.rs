//! Challenge gates.

use bay_booking_core::challenge::ChallengeGate;

/// A fixed question with one accepted answer and an optional bypass code.
///
/// Answers are compared trimmed and case-insensitively.
#[derive(Debug, Clone)]
pub struct StaticChallenge {
    question: String,
    answer: String,
    bypass_code: Option<String>,
}

impl StaticChallenge {
    /// Create a gate.
    #[must_use]
    pub fn new(question: impl Into<String>, answer: impl Into<String>, bypass_code: Option<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into().trim().to_string(),
            bypass_code: bypass_code
                .map(|code| code.trim().to_string())
                .filter(|code| !code.is_empty()),
        }
    }
}

impl ChallengeGate for StaticChallenge {
    fn question(&self) -> Option<String> {
        Some(self.question.clone())
    }

    fn verify(&self, answer: &str) -> bool {
        let answer = answer.trim();
        !answer.is_empty()
            && (answer.eq_ignore_ascii_case(&self.answer)
                || self
                    .bypass_code
                    .as_deref()
                    .is_some_and(|code| answer.eq_ignore_ascii_case(code)))
    }
}

/// No challenge: every session is verified.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

impl ChallengeGate for OpenGate {
    fn question(&self) -> Option<String> {
        None
    }

    fn verify(&self, _answer: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_challenge_accepts_answer_or_bypass() {
        let gate = StaticChallenge::new("Which site is this?", "Perth", Some("letmein".into()));
        assert!(gate.is_enabled());
        assert!(gate.verify(" perth "));
        assert!(gate.verify("LETMEIN"));
        assert!(!gate.verify("sydney"));
        assert!(!gate.verify(""));
    }

    #[test]
    fn blank_bypass_is_ignored() {
        let gate = StaticChallenge::new("q", "a", Some("  ".into()));
        assert!(!gate.verify("  "));
    }

    #[test]
    fn open_gate_is_disabled() {
        assert!(!OpenGate.is_enabled());
        assert!(OpenGate.verify("anything"));
    }
}
