//! Human challenge gate.
//!
//! Lock acquisition is only reachable once the gate has signalled "verified"
//! for a session.

/// Question/answer gate placed in front of lock acquisition.
pub trait ChallengeGate: Send + Sync {
    /// The question to show, or `None` when the gate is disabled.
    fn question(&self) -> Option<String>;

    /// Whether `answer` passes the gate.
    fn verify(&self, answer: &str) -> bool;

    /// Whether sessions must verify before requesting a bay.
    fn is_enabled(&self) -> bool {
        self.question().is_some()
    }
}
