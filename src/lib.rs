//! Booking and payment consistency engine for mentor sessions.
//!
//! Mentors publish weekly availability; mentees book concrete slots; payment
//! completion arrives from the client and from the gateway webhook in any
//! order and is applied exactly once; refresh-token sessions rotate with
//! reuse detection.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
