//! Visitor Bays - visitor parking-bay booking with time-boxed holds
//!
//! A small pool of visitor bays is shared by everyone booking through the
//! web front end. A visitor takes a temporary hold on one bay, fills in the
//! booking form before the hold runs out, and the hold becomes a booking.
//! Holds that are never confirmed are reaped so the bay goes back to the
//! pool.
//!
//! # Flow
//!
//! ```text
//!  idle ──CheckAvailability──▶ availability_shown ──RequestBay──▶ locked
//!   ▲                                                              │  │
//!   │                                                     Finalize │  │ countdown hits 0
//!   │                                                              ▼  ▼
//!   └──────────────Restart────────────── expired          confirmed
//! ```
//!
//! - **Window**: bookings open in the evening for tomorrow and stay open into
//!   the early morning for today, all in the site's timezone ([`window`]).
//! - **Lease**: reap stale holds, count occupancy, take a hold, confirm it
//!   ([`lease`]). Two acquisition strategies are available; the slot-claim
//!   strategy cannot overbook under concurrency.
//! - **Session**: one reducer per visitor drives the state machine above
//!   ([`session`]), with all I/O returned as effects.
//! - **Sweeper**: a background task reaps stale holds and evicts idle
//!   sessions ([`sweeper`]).
//!
//! # Usage
//!
//! ```bash
//! STORE_BACKEND=memory cargo run --bin visitor-bays
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod app;
pub mod challenge;
pub mod config;
pub mod lease;
pub mod metrics;
pub mod notify;
pub mod server;
pub mod session;
pub mod sweeper;
pub mod window;

pub use app::{BookingApp, StartupError};
pub use config::{Config, ConfigError};
pub use session::{SessionAction, SessionId, SessionReducer, SessionRegistry, SessionState};
pub use window::{WindowGate, WindowStatus};
