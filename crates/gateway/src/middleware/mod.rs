//! Router middleware

pub mod metrics;
