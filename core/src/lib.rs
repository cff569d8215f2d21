//! # Bay Booking Core
//!
//! Shared vocabulary for the visitor bay booking workspace.
//!
//! - [`reducer`]: the [`Reducer`] trait every session state machine implements
//! - [`effect`]: [`Effect`] values a reducer returns instead of doing I/O
//! - [`environment`]: the injected [`Clock`]
//! - [`bay`]: records, identities and lock handles
//! - [`store`]: the shared reservation table every session coordinates through
//! - [`notify`]: outbound booking notifications (best effort)
//! - [`challenge`]: the human challenge gate in front of lock acquisition
//!
//! ```text
//! HTTP command ──▶ reduce(state, action, env) ──▶ Effects ──▶ runtime
//!                        ▲                                      │
//!                        └────────── feedback action ◀──────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use bay_booking_core::{async_effect, Effects, Reducer, smallvec};
//!
//! impl Reducer for SessionReducer {
//!     type State = SessionState;
//!     type Action = SessionAction;
//!     type Environment = SessionEnvironment;
//!
//!     fn reduce(&self, state: &mut SessionState, action: SessionAction, env: &SessionEnvironment) -> Effects<SessionAction> {
//!         match action {
//!             SessionAction::CheckAvailability => {
//!                 let capacity = env.capacity.clone();
//!                 smallvec![async_effect! { /* count, then feed back */ None }]
//!             },
//!             _ => Effects::new(),
//!         }
//!     }
//! }
//! ```

pub use chrono::{DateTime, NaiveDate, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

pub mod bay;
pub mod challenge;
pub mod effect;
pub mod effect_macros;
pub mod environment;
pub mod notify;
pub mod reducer;
pub mod store;

pub use effect::Effect;
pub use environment::{Clock, SystemClock};
pub use reducer::{Effects, Reducer};
