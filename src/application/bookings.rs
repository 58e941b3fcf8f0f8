use super::bounded;
use crate::domain::booking::{Booking, BookingReceipt, BookingStatus};
use crate::domain::clock::{Clock, TimeRange, day_of_week, parse_clock, parse_date};
use crate::domain::ports::{
    AvailabilityStore, BookingStore, MentorDirectory, ServiceCatalog, Transactor,
};
use crate::error::{EngineError, Result};
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Creates bookings so that no two slot-holding bookings of a mentor ever
/// overlap on the same date.
///
/// Everything the client sends is re-derived from stored state: the end time
/// and price come from the offering, the window from the mentor's rules. The
/// final conflict check and the insert happen in one serializable
/// transaction under the `(mentor, date)` lock. A failed attempt is not
/// retried here; a retryable error goes back to the caller.
pub struct BookingOrchestrator {
    mentors: Arc<dyn MentorDirectory>,
    services: Arc<dyn ServiceCatalog>,
    availability: Arc<dyn AvailabilityStore>,
    bookings: Arc<dyn BookingStore>,
    transactor: Arc<dyn Transactor>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl BookingOrchestrator {
    pub fn new(
        mentors: Arc<dyn MentorDirectory>,
        services: Arc<dyn ServiceCatalog>,
        availability: Arc<dyn AvailabilityStore>,
        bookings: Arc<dyn BookingStore>,
        transactor: Arc<dyn Transactor>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            mentors,
            services,
            availability,
            bookings,
            transactor,
            clock,
            timeout,
        }
    }

    pub async fn create_booking(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        date: &str,
        start: &str,
    ) -> Result<BookingReceipt> {
        let booking_date = parse_date(date)?;
        let start = parse_clock(start)?;

        let service = bounded(self.timeout, self.services.get_service(service_id))
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| EngineError::Validation("invalid service".to_string()))?;
        let mentor = bounded(self.timeout, self.mentors.get_mentor(service.mentor_id))
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| EngineError::Validation("mentor not available".to_string()))?;

        let range = TimeRange::starting_at(start, service.duration_minutes)?;

        let rules = bounded(
            self.timeout,
            self.availability
                .rules_for_mentor_and_day(mentor.id, day_of_week(booking_date)),
        )
        .await?;
        if rules.is_empty() {
            return Err(EngineError::Conflict(
                "mentor not available on this day".to_string(),
            ));
        }
        if !rules.iter().any(|r| r.window().contains(&range)) {
            return Err(EngineError::Conflict(
                "selected slot outside availability".to_string(),
            ));
        }

        let booking = Booking::pending(user_id, &service, booking_date, range, self.clock.now());

        let mut tx = bounded(self.timeout, self.transactor.begin_serializable()).await?;
        let taken = bounded(
            self.timeout,
            tx.conflicts_locked(mentor.id, booking_date, range),
        )
        .await?;
        if taken {
            warn!(
                mentor = %mentor.username,
                date = %booking_date,
                start = %range.start.format("%H:%M"),
                "slot already booked"
            );
            return Err(EngineError::Conflict("slot already booked".to_string()));
        }
        bounded(self.timeout, tx.insert_booking(booking.clone())).await?;
        bounded(self.timeout, tx.commit()).await?;

        info!(
            booking_id = %booking.id,
            mentor = %mentor.username,
            user_id = %user_id,
            date = %booking_date,
            start = %range.start.format("%H:%M"),
            end = %range.end.format("%H:%M"),
            "booking created"
        );
        Ok(BookingReceipt::from(&booking))
    }

    /// The user's bookings, latest date and start first.
    pub async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<BookingReceipt>> {
        let mut bookings = bounded(self.timeout, self.bookings.bookings_for_user(user_id)).await?;
        bookings.sort_by_key(|b| Reverse((b.booking_date, b.start_time)));
        Ok(bookings.iter().map(BookingReceipt::from).collect())
    }

    /// Confirmed sessions of the mentor with `username`, latest first.
    pub async fn confirmed_sessions_for_mentor(&self, username: &str) -> Result<Vec<Booking>> {
        let mentor = bounded(self.timeout, self.mentors.find_mentor_by_username(username))
            .await?
            .ok_or(EngineError::NotFound("mentor"))?;
        let mut sessions = bounded(
            self.timeout,
            self.bookings
                .bookings_for_mentor_with_status(mentor.id, BookingStatus::Confirmed),
        )
        .await?;
        sessions.sort_by_key(|b| Reverse((b.booking_date, b.start_time)));
        Ok(sessions)
    }
}
