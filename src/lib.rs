//! Adapt Planner — onboarding day resolution and per-day planner tracking.

pub mod adaptation;
pub mod config;
pub mod error;
pub mod program;
pub mod store;
