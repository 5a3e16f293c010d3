//! API handlers module

pub mod chat;
pub mod detail;
pub mod health;
pub mod search;
