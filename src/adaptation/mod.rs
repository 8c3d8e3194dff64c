//! Adaptation program core: which onboarding day it is for a user, and the
//! per-day planner state they build up.

pub mod clock;
pub mod day;
pub mod locks;
pub mod model;
pub mod routes;
pub mod service;
pub mod tracker;

pub use clock::{CivilClock, Clock, FixedClock};
pub use day::{Reason, Resolution};
pub use model::{OnboardingProfile, PlannerItem, UserDayState};
pub use routes::{AdaptationRouteState, adaptation_routes};
pub use service::{AdaptationService, SkipOutcome, Today, UserProgress};
pub use tracker::{ItemStatus, PlannerView};
