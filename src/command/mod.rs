//! Remote command parsing and application.

pub mod dispatch;
pub mod schema;
