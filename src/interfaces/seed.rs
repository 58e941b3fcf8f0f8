use crate::domain::availability::AvailabilityRule;
use crate::domain::booking::Booking;
use crate::domain::clock::parse_clock;
use crate::domain::mentor::{Mentor, MentorService};
use crate::domain::ports::Backend;
use crate::domain::user::UserAccount;
use crate::error::{EngineError, Result};
use serde::Deserialize;
use std::io::Read;
use tracing::info;

/// A weekly window keyed by mentor username, the shape operators write.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedRule {
    pub mentor: String,
    pub day_of_week: u8,
    pub start: String,
    pub end: String,
}

/// Reference data for a fresh store: accounts, mentors, offerings, rules and
/// bookings that already exist elsewhere.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub users: Vec<UserAccount>,
    pub mentors: Vec<Mentor>,
    pub services: Vec<MentorService>,
    pub rules: Vec<SeedRule>,
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub mentors: usize,
    pub services: usize,
    pub rules_added: usize,
    pub bookings_added: usize,
}

impl Seed {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        serde_json::from_reader(source)
            .map_err(|e| EngineError::Validation(format!("invalid seed file: {e}")))
    }

    /// Loads the seed into `backend`. Safe to run repeatedly: rows are
    /// upserted, and rules or bookings already present are skipped.
    pub async fn apply<B: Backend>(self, backend: &B) -> Result<SeedReport> {
        let mut report = SeedReport::default();

        for user in self.users {
            backend.upsert_user(user).await?;
            report.users += 1;
        }
        for mentor in self.mentors {
            backend.upsert_mentor(mentor).await?;
            report.mentors += 1;
        }
        for service in self.services {
            service.validate()?;
            backend.upsert_service(service).await?;
            report.services += 1;
        }

        for row in self.rules {
            let mentor = backend
                .find_mentor_by_username(&row.mentor)
                .await?
                .ok_or(EngineError::NotFound("mentor"))?;
            let rule = AvailabilityRule::new(
                mentor.id,
                row.day_of_week,
                parse_clock(&row.start)?,
                parse_clock(&row.end)?,
            )?;
            let existing = backend.rules_for_mentor(mentor.id).await?;
            let duplicate = existing.iter().any(|r| {
                r.day_of_week == rule.day_of_week
                    && r.start_time == rule.start_time
                    && r.end_time == rule.end_time
            });
            if !duplicate {
                backend.insert_rule(rule).await?;
                report.rules_added += 1;
            }
        }

        for booking in self.bookings {
            if backend.get_booking(booking.id).await?.is_some() {
                continue;
            }
            let mut tx = backend.begin_serializable().await?;
            let overlaps = tx
                .conflicts_locked(booking.mentor_id, booking.booking_date, booking.range())
                .await?;
            if overlaps && booking.status.holds_slot() {
                return Err(EngineError::Conflict(format!(
                    "seed booking {} overlaps an existing booking",
                    booking.id
                )));
            }
            tx.insert_booking(booking).await?;
            tx.commit().await?;
            report.bookings_added += 1;
        }

        info!(?report, "seed applied");
        Ok(report)
    }
}
