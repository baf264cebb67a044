//! HTTP request handlers.

pub mod health;
pub mod payment;

pub use health::{health_check, readiness_check};
pub use payment::{confirm_session, confirm_view, create_session, get_session};
