//! Value types and pure rules of the booking and payment engine, plus the
//! collaborator traits in [`ports`].

pub mod availability;
pub mod booking;
pub mod clock;
pub mod mentor;
pub mod payment;
pub mod ports;
pub mod session;
pub mod user;
pub mod webhook;
