use super::bounded;
use crate::domain::availability::{AvailabilityRule, plan_slots};
use crate::domain::clock::{DATE_FORMAT, TimeRange, day_of_week, parse_clock, parse_date};
use crate::domain::mentor::Mentor;
use crate::domain::ports::{AvailabilityStore, BookingStore, MentorDirectory, ServiceCatalog};
use crate::error::{EngineError, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Free slots of one offering on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotSchedule {
    pub date: String,
    pub slots: Vec<TimeRange>,
}

/// Read side of availability: turns weekly rules into concrete free slots.
/// Holds no locks, so any number of calls may run in parallel.
pub struct SlotPlanner {
    mentors: Arc<dyn MentorDirectory>,
    services: Arc<dyn ServiceCatalog>,
    availability: Arc<dyn AvailabilityStore>,
    bookings: Arc<dyn BookingStore>,
    timeout: Duration,
}

impl SlotPlanner {
    pub fn new(
        mentors: Arc<dyn MentorDirectory>,
        services: Arc<dyn ServiceCatalog>,
        availability: Arc<dyn AvailabilityStore>,
        bookings: Arc<dyn BookingStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            mentors,
            services,
            availability,
            bookings,
            timeout,
        }
    }

    async fn mentor_by_username(&self, username: &str) -> Result<Mentor> {
        bounded(self.timeout, self.mentors.find_mentor_by_username(username))
            .await?
            .ok_or(EngineError::NotFound("mentor"))
    }

    pub async fn compute_slots(
        &self,
        username: &str,
        service_id: Uuid,
        date: &str,
    ) -> Result<SlotSchedule> {
        let date = parse_date(date)?;
        let mentor = self.mentor_by_username(username).await?;

        let service = bounded(self.timeout, self.services.get_service(service_id))
            .await?
            .filter(|s| s.mentor_id == mentor.id)
            .ok_or_else(|| EngineError::Validation("invalid service".to_string()))?;

        let rules = bounded(
            self.timeout,
            self.availability
                .rules_for_mentor_and_day(mentor.id, day_of_week(date)),
        )
        .await?;
        let taken: Vec<TimeRange> =
            bounded(self.timeout, self.bookings.active_bookings_on(mentor.id, date))
                .await?
                .iter()
                .map(|b| b.range())
                .collect();

        let slots = plan_slots(&rules, service.duration_minutes, &taken);
        debug!(
            mentor = %mentor.username,
            %date,
            rules = rules.len(),
            taken = taken.len(),
            free = slots.len(),
            "computed slots"
        );

        Ok(SlotSchedule {
            date: date.format(DATE_FORMAT).to_string(),
            slots,
        })
    }

    /// Publishes a weekly window for the mentor with `username`.
    pub async fn add_rule(
        &self,
        username: &str,
        day_of_week: u8,
        start: &str,
        end: &str,
    ) -> Result<AvailabilityRule> {
        let start = parse_clock(start)?;
        let end = parse_clock(end)?;
        let mentor = self.mentor_by_username(username).await?;
        if !mentor.is_active {
            return Err(EngineError::Validation("mentor is not active".to_string()));
        }

        let rule = AvailabilityRule::new(mentor.id, day_of_week, start, end)?;
        bounded(self.timeout, self.availability.insert_rule(rule.clone())).await?;
        info!(
            mentor = %mentor.username,
            day_of_week,
            start = %rule.start_time.format("%H:%M"),
            end = %rule.end_time.format("%H:%M"),
            "availability rule added"
        );
        Ok(rule)
    }

    /// The mentor's weekly rules, by day then start time.
    pub async fn rules_for(&self, username: &str) -> Result<Vec<AvailabilityRule>> {
        let mentor = self.mentor_by_username(username).await?;
        let mut rules = bounded(self.timeout, self.availability.rules_for_mentor(mentor.id)).await?;
        rules.sort_by_key(|r| (r.day_of_week, r.start_time, r.end_time));
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fixtures::World;
    use crate::domain::booking::BookingStatus;
    use crate::domain::clock::parse_clock;

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange::new(parse_clock(start).unwrap(), parse_clock(end).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_existing_booking_removes_its_slot() {
        let world = World::new().await;
        world
            .seed_booking("11:00", BookingStatus::Confirmed)
            .await;

        let schedule = world
            .engine
            .slots
            .compute_slots("asha", world.service.id, World::MONDAY)
            .await
            .unwrap();
        assert_eq!(schedule.date, World::MONDAY);
        assert_eq!(schedule.slots, vec![range("10:00", "11:00")]);
    }

    #[tokio::test]
    async fn test_released_bookings_do_not_block() {
        let world = World::new().await;
        world
            .seed_booking("10:00", BookingStatus::PaymentFailed)
            .await;
        world.seed_booking("11:00", BookingStatus::Cancelled).await;

        let schedule = world
            .engine
            .slots
            .compute_slots("asha", world.service.id, World::MONDAY)
            .await
            .unwrap();
        assert_eq!(schedule.slots.len(), 2);
    }

    #[tokio::test]
    async fn test_day_without_rules_is_empty() {
        let world = World::new().await;
        let schedule = world
            .engine
            .slots
            .compute_slots("asha", world.service.id, "2025-01-07")
            .await
            .unwrap();
        assert!(schedule.slots.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let world = World::new().await;
        let slots = &world.engine.slots;

        assert!(matches!(
            slots.compute_slots("nobody", world.service.id, World::MONDAY).await,
            Err(EngineError::NotFound("mentor"))
        ));
        assert!(matches!(
            slots.compute_slots("asha", Uuid::new_v4(), World::MONDAY).await,
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            slots.compute_slots("asha", world.service.id, "06-01-2025").await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_service_of_another_mentor_is_invalid() {
        let world = World::new().await;
        let other = world.add_mentor("dev").await;
        let schedule = world
            .engine
            .slots
            .compute_slots(&other.username, world.service.id, World::MONDAY)
            .await;
        assert!(matches!(schedule, Err(EngineError::Validation(msg)) if msg == "invalid service"));
    }

    #[tokio::test]
    async fn test_add_and_list_rules() {
        let world = World::new().await;
        let slots = &world.engine.slots;

        slots.add_rule("asha", 3, "14:00", "15:00").await.unwrap();
        slots.add_rule("asha", 1, "08:00", "09:00").await.unwrap();
        assert!(matches!(
            slots.add_rule("asha", 2, "14:00", "14:15").await,
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            slots.add_rule("asha", 2, "2pm", "3pm").await,
            Err(EngineError::Validation(_))
        ));

        let rules = slots.rules_for("asha").await.unwrap();
        let days: Vec<(u8, String)> = rules
            .iter()
            .map(|r| (r.day_of_week, r.start_time.format("%H:%M").to_string()))
            .collect();
        assert_eq!(
            days,
            vec![
                (1, "08:00".to_string()),
                (1, "10:00".to_string()),
                (3, "14:00".to_string()),
            ]
        );
    }
}
