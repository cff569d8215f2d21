//! HTTP request handlers shared by every service in the workspace.

pub mod health;

pub use health::{HealthReport, health_check, readiness};
