//! Per-visitor booking sessions.
//!
//! A session is a value ([`SessionState`]) driven by a pure reducer
//! ([`SessionReducer`]); the [`SessionRegistry`] keeps it between requests.

mod actions;
mod environment;
mod reducer;
mod registry;
mod types;


pub use actions::SessionAction;
pub use environment::SessionEnvironment;
pub use reducer::SessionReducer;
pub use registry::{RegistryError, SessionRegistry};
pub use types::{SessionError, SessionId, SessionPhase, SessionState, SessionView};
