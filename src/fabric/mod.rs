//! Offline model of the cabled fabric, used to prove a rule set delivers
//! every host pair before anything touches a switch.

mod trace;
mod wiring;

pub use trace::PathVerifier;
pub use wiring::Wiring;
